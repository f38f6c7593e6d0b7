//! Async client for the Netro Public API.
//!
//! # Design
//! `NetroClient` pairs a stateless `NetroApi` with a caller-supplied
//! `Transport`. Every operation is one `build_*`, one awaited
//! `Transport::execute`, and one `parse_*`. There are no retries, timeouts
//! or locks at this layer, and concurrent calls share nothing mutable.

use tracing::debug;

use crate::api::NetroApi;
use crate::config::NetroConfig;
use crate::envelope::{ApiResponse, Meta};
use crate::error::{NetroError, Result};
use crate::http::{BoxError, HttpRequest, HttpResponse, Transport};
use crate::types::{
    DateRange, DeviceInfo, Event, EventKind, Moisture, Schedule, SensorReading, WaterRequest,
    WeatherReport,
};

#[derive(Debug, Clone)]
pub struct NetroClient<T> {
    api: NetroApi,
    transport: T,
}

impl<T: Transport> NetroClient<T> {
    pub fn new(transport: T, config: NetroConfig) -> Result<Self> {
        Ok(Self {
            api: NetroApi::new(config)?,
            transport,
        })
    }

    /// Client against the public endpoint with default settings.
    pub fn with_defaults(transport: T) -> Result<Self> {
        Self::new(transport, NetroConfig::default())
    }

    /// The request builder/parser, for hosts that drive I/O themselves.
    pub fn api(&self) -> &NetroApi {
        &self.api
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(method = request.method.as_str(), url = %request.url, "Netro request");
        self.transport.execute(request).await.map_err(from_transport)
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub async fn get_info(&self, key: &str) -> Result<ApiResponse<DeviceInfo>> {
        let request = self.api.build_get_info(key)?;
        self.api.parse_get_info(self.send(request).await?)
    }

    pub async fn get_schedules(
        &self,
        key: &str,
        range: DateRange,
        zones: Option<&[u32]>,
    ) -> Result<ApiResponse<Vec<Schedule>>> {
        let request = self.api.build_get_schedules(key, range, zones)?;
        self.api.parse_get_schedules(self.send(request).await?)
    }

    pub async fn get_moistures(
        &self,
        key: &str,
        range: DateRange,
        zones: Option<&[u32]>,
    ) -> Result<ApiResponse<Vec<Moisture>>> {
        let request = self.api.build_get_moistures(key, range, zones)?;
        self.api.parse_get_moistures(self.send(request).await?)
    }

    pub async fn get_events(
        &self,
        key: &str,
        event: Option<EventKind>,
        range: DateRange,
    ) -> Result<ApiResponse<Vec<Event>>> {
        let request = self.api.build_get_events(key, event, range)?;
        self.api.parse_get_events(self.send(request).await?)
    }

    pub async fn get_sensor_data(
        &self,
        key: &str,
        range: DateRange,
    ) -> Result<ApiResponse<Vec<SensorReading>>> {
        let request = self.api.build_get_sensor_data(key, range)?;
        self.api.parse_get_sensor_data(self.send(request).await?)
    }

    // ── Commands ────────────────────────────────────────────────────

    pub async fn set_status(&self, key: &str, enabled: Option<bool>) -> Result<Meta> {
        let request = self.api.build_set_status(key, enabled)?;
        self.api.parse_command(self.send(request).await?)
    }

    pub async fn water(&self, key: &str, request: &WaterRequest) -> Result<Meta> {
        let request = self.api.build_water(key, request)?;
        self.api.parse_command(self.send(request).await?)
    }

    pub async fn stop_water(&self, key: &str) -> Result<Meta> {
        let request = self.api.build_stop_water(key)?;
        self.api.parse_command(self.send(request).await?)
    }

    pub async fn no_water(&self, key: &str, days: u32) -> Result<Meta> {
        let request = self.api.build_no_water(key, days)?;
        self.api.parse_command(self.send(request).await?)
    }

    pub async fn set_moisture(&self, key: &str, moisture: u8, zones: Option<&[u32]>) -> Result<Meta> {
        let request = self.api.build_set_moisture(key, moisture, zones)?;
        self.api.parse_command(self.send(request).await?)
    }

    pub async fn report_weather(&self, key: &str, report: &WeatherReport) -> Result<Meta> {
        let request = self.api.build_report_weather(key, report)?;
        self.api.parse_command(self.send(request).await?)
    }
}

/// Adapter errors become `Unexpected`, unless the adapter already produced
/// a `NetroError`.
fn from_transport(err: BoxError) -> NetroError {
    match err.downcast::<NetroError>() {
        Ok(err) => *err,
        Err(source) => NetroError::Unexpected { source },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use crate::http::HttpMethod;
    use crate::types::DeviceKind;

    /// Replays one canned outcome and records every request it sees.
    struct FakeTransport {
        reply: Mutex<Option<std::result::Result<HttpResponse, BoxError>>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl FakeTransport {
        fn replying(status: u16, body: &str) -> Self {
            Self {
                reply: Mutex::new(Some(Ok(HttpResponse::new(status, body)))),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(err: BoxError) -> Self {
            Self {
                reply: Mutex::new(Some(Err(err))),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn execute(&self, request: HttpRequest) -> std::result::Result<HttpResponse, BoxError> {
            self.seen.lock().unwrap().push(request);
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err("no reply queued".into()))
        }
    }

    fn client(transport: FakeTransport) -> NetroClient<Arc<FakeTransport>> {
        NetroClient::with_defaults(Arc::new(transport)).unwrap()
    }

    #[tokio::test]
    async fn get_info_goes_through_transport() {
        let client = client(FakeTransport::replying(
            200,
            r#"{"status":"OK","data":{"device":{"serial":"C1","zone_num":1,"zones":[{"ith":1,"name":"Pots","enabled":true,"smart":"TIMER"}],"battery_level":0.9}}}"#,
        ));
        let info = client.get_info("C1").await.unwrap();
        assert_eq!(info.data.kind(), DeviceKind::BatterySingleZone);

        let seen = client.transport().requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, HttpMethod::Get);
        assert_eq!(seen[0].url, "https://api.netrohome.com/npa/v1/info.json");
        assert_eq!(seen[0].query_param("key"), Some("C1"));
    }

    #[tokio::test]
    async fn validation_failure_skips_transport() {
        let client = client(FakeTransport::replying(200, "{}"));
        let err = client.no_water("C1", 0).await.unwrap_err();
        assert!(matches!(err, NetroError::InvalidArgument { name: "days", .. }));
        assert!(client.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_unexpected_with_cause() {
        let client = client(FakeTransport::failing("connection reset".into()));
        let err = client.stop_water("C1").await.unwrap_err();
        match err {
            NetroError::Unexpected { source } => assert_eq!(source.to_string(), "connection reset"),
            other => panic!("expected Unexpected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_netro_error_passes_through() {
        let client = client(FakeTransport::failing(Box::new(NetroError::Http {
            status: 504,
            body: "gateway timeout".to_string(),
        })));
        let err = client.get_info("C1").await.unwrap_err();
        assert!(matches!(err, NetroError::Http { status: 504, .. }));
    }

    #[tokio::test]
    async fn http_status_is_checked_before_json() {
        let client = client(FakeTransport::replying(401, "not json"));
        let err = client.get_info("C1").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn command_returns_meta() {
        let client = client(FakeTransport::replying(
            200,
            r#"{"status":"OK","meta":{"token_remaining":12},"data":{}}"#,
        ));
        let meta = client.water("C1", &WaterRequest::minutes(5)).await.unwrap();
        assert_eq!(meta.token_remaining, Some(12));
        let seen = client.transport().requests();
        assert_eq!(seen[0].method, HttpMethod::Post);
        assert!(seen[0].body.as_deref().unwrap().contains("\"duration\":5"));
    }

    #[tokio::test]
    async fn concurrent_calls_are_independent() {
        let transport = Arc::new(FakeTransport::replying(
            200,
            r#"{"status":"OK","data":{"sensor":{"serial":"S1","battery_level":0.5}}}"#,
        ));
        let client = NetroClient::with_defaults(Arc::clone(&transport)).unwrap();
        let (a, b) = tokio::join!(client.get_info("S1"), client.get_info("S1"));
        // One reply was queued: exactly one call succeeds, the other sees the
        // transport's own failure.
        assert!(a.is_ok() != b.is_ok());
        assert_eq!(transport.requests().len(), 2);
    }
}
