//! HTTP transport contract for the Netro client.
//!
//! # Design
//! Requests and responses are plain data. `NetroApi` builds `HttpRequest`
//! values and parses `HttpResponse` values without touching the network;
//! the embedding application supplies a `Transport` that performs the
//! actual round-trip with whatever HTTP stack, TLS settings, pooling and
//! retry policy it wants.
//!
//! All fields use owned types (`String`, `Vec`) so values can be handed to
//! blocking threads or recorded as fixtures without lifetime concerns.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// Boxed error surfaced by a transport adapter.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// HTTP method for a request. The vendor API only uses GET and POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

/// An HTTP request described as plain data.
///
/// `url` is absolute and carries no query string; query parameters live in
/// `query` so adapters can encode them with their own HTTP stack.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    /// Advisory; honored by the adapter, never enforced by the client.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Look up a query parameter by name.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Look up a header by name, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Convenience constructor for adapters and fakes that ignore headers.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> &str {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Capability to execute one HTTP round-trip.
///
/// Implementations must return non-2xx responses as `Ok(HttpResponse)`;
/// `Err` is reserved for failures where no response exists at all
/// (connection refused, DNS, timeout, cancellation). An adapter may return
/// a boxed [`NetroError`](crate::NetroError) to have it passed through to
/// the caller unchanged.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, BoxError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, BoxError> {
        (**self).execute(request).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for &T {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, BoxError> {
        (**self).execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_covers_2xx_only() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(199, "").is_success());
        assert!(!HttpResponse::new(301, "").is_success());
        assert!(!HttpResponse::new(401, "").is_success());
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = HttpRequest {
            method: HttpMethod::Get,
            url: "http://localhost/info.json".to_string(),
            query: vec![("key".to_string(), "ABC".to_string())],
            headers: vec![("Accept".to_string(), "application/json".to_string())],
            body: None,
            timeout: None,
        };
        assert_eq!(req.header("accept"), Some("application/json"));
        assert_eq!(req.query_param("key"), Some("ABC"));
        assert_eq!(req.query_param("zones"), None);
    }

    #[test]
    fn response_json_reports_parse_failure() {
        let resp = HttpResponse::new(200, "not json");
        assert_eq!(resp.text(), "not json");
        assert!(resp.json::<serde_json::Value>().is_err());
    }
}
