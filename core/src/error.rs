//! Error taxonomy for the Netro client.
//!
//! # Design
//! Every failure path ends in exactly one variant so callers can tell "the
//! HTTP layer failed" (`Http`), "the body was not JSON" (`Decode`), "the
//! vendor rejected the request" (`Api`) and "the response had an
//! unexpected shape" (`Schema`) apart. Nothing is retried here; the
//! `is_*` helpers exist so the embedding application can decide.

use thiserror::Error;

use crate::http::BoxError;

pub type Result<T> = std::result::Result<T, NetroError>;

/// Vendor error code: the key (device serial) is unknown or revoked.
pub const CODE_INVALID_KEY: i64 = 1;
/// Vendor error code: the daily call budget is exhausted.
pub const CODE_CALL_LIMIT: i64 = 2;
/// Vendor error code: the device or sensor is not valid for this call.
pub const CODE_INVALID_DEVICE: i64 = 3;
/// Vendor error code: server-side failure.
pub const CODE_INTERNAL: i64 = 4;
/// Vendor error code: a request parameter was rejected.
pub const CODE_PARAMETER: i64 = 5;

#[derive(Debug, Error)]
pub enum NetroError {
    /// A parameter failed validation before any request was made.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    /// The transport returned a non-2xx status. The body is never parsed.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body was not valid JSON.
    #[error("response is not valid JSON: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    /// The envelope carried `"status": "ERROR"`.
    #[error("Netro API error{}: {message}", .code.map(|c| format!(" {c}")).unwrap_or_default())]
    Api { code: Option<i64>, message: String },

    /// An OK envelope lacked a field required by the operation, or a field
    /// held a value outside its domain.
    #[error("unexpected response shape at `{key}`: {message}")]
    Schema { key: String, message: String },

    /// Anything else, typically a transport failure with no response.
    #[error("unexpected error: {source}")]
    Unexpected {
        #[source]
        source: BoxError,
    },
}

impl NetroError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::Schema {
            message: format!("missing field `{key}`"),
            key,
        }
    }

    /// HTTP status code, when the failure came from a non-2xx response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Vendor error code from an ERROR envelope.
    pub fn api_error_code(&self) -> Option<i64> {
        match self {
            Self::Api { code, .. } => *code,
            _ => None,
        }
    }

    /// Returns `true` if re-keying or re-authenticating might resolve this.
    pub fn is_auth_error(&self) -> bool {
        match self {
            Self::Http { status, .. } => matches!(status, 401 | 403),
            Self::Api { code, message } => {
                let lower = message.to_ascii_lowercase();
                *code == Some(CODE_INVALID_KEY)
                    || lower.contains("auth")
                    || lower.contains("invalid key")
            }
            _ => false,
        }
    }

    /// Returns `true` if the same call might succeed later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            Self::Api { code, .. } => matches!(*code, Some(CODE_CALL_LIMIT) | Some(CODE_INTERNAL)),
            Self::Unexpected { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(code: Option<i64>, message: &str) -> NetroError {
        NetroError::Api {
            code,
            message: message.to_string(),
        }
    }

    #[test]
    fn auth_detection() {
        let http = |status| NetroError::Http {
            status,
            body: String::new(),
        };
        assert!(http(401).is_auth_error());
        assert!(http(403).is_auth_error());
        assert!(!http(404).is_auth_error());
        assert!(api(Some(1), "Invalid key : X").is_auth_error());
        assert!(api(None, "Invalid key").is_auth_error());
        assert!(api(Some(9), "authorization refused").is_auth_error());
        assert!(!api(Some(5), "Parameter error").is_auth_error());
    }

    #[test]
    fn transient_detection() {
        let http = |status| NetroError::Http {
            status,
            body: String::new(),
        };
        assert!(http(503).is_transient());
        assert!(http(429).is_transient());
        assert!(!http(400).is_transient());
        assert!(api(Some(CODE_CALL_LIMIT), "Exceed call limit").is_transient());
        assert!(!api(Some(CODE_INVALID_DEVICE), "Invalid device").is_transient());
        assert!(!NetroError::missing("data").is_transient());
    }

    #[test]
    fn display_includes_code_when_present() {
        assert_eq!(api(Some(3), "Invalid device").to_string(), "Netro API error 3: Invalid device");
        assert_eq!(api(None, "API ERROR").to_string(), "Netro API error: API ERROR");
    }

    #[test]
    fn missing_names_the_key() {
        let err = NetroError::missing("data.device");
        match err {
            NetroError::Schema { key, message } => {
                assert_eq!(key, "data.device");
                assert_eq!(message, "missing field `data.device`");
            }
            other => panic!("expected Schema, got {other:?}"),
        }
    }

    #[test]
    fn accessors() {
        let err = NetroError::Http {
            status: 401,
            body: "denied".to_string(),
        };
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.api_error_code(), None);
        assert_eq!(api(Some(2), "x").api_error_code(), Some(2));
    }
}
