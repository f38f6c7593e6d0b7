//! Stateless request builder and response parser for the Netro Public API.
//!
//! # Design
//! `NetroApi` holds only its immutable configuration. Each operation is
//! split into a `build_*` method that validates the inputs and produces an
//! `HttpRequest`, and a `parse_*` method that consumes an `HttpResponse`.
//! `NetroClient` glues the two together around a `Transport`; hosts that
//! prefer to drive I/O themselves can call the halves directly.
//!
//! Every `parse_*` runs the same pipeline: status code, JSON, envelope
//! status, then payload mapping. The first failing stage decides the error.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::NetroConfig;
use crate::envelope::{ApiResponse, Envelope, Meta};
use crate::error::{NetroError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::mapping;
use crate::types::{
    DateRange, DeviceInfo, Event, EventKind, Moisture, Schedule, SensorReading, WaterRequest,
    WeatherReport,
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone)]
pub struct NetroApi {
    base_url: String,
    config: NetroConfig,
}

// Request bodies for the POST endpoints.

#[derive(Serialize)]
struct KeyBody<'a> {
    key: &'a str,
}

#[derive(Serialize)]
struct SetStatusBody<'a> {
    key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u8>,
}

#[derive(Serialize)]
struct WaterBody<'a> {
    key: &'a str,
    duration: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    zones: Option<&'a [u32]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delay: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_time: Option<String>,
}

#[derive(Serialize)]
struct NoWaterBody<'a> {
    key: &'a str,
    days: u32,
}

#[derive(Serialize)]
struct SetMoistureBody<'a> {
    key: &'a str,
    moisture: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    zones: Option<&'a [u32]>,
}

#[derive(Serialize)]
struct WeatherBody<'a> {
    key: &'a str,
    date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    condition: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rain: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rain_prob: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temp: Option<f64>,
}

impl NetroApi {
    pub fn new(config: NetroConfig) -> Result<Self> {
        let base_url = config.normalized_base_url()?;
        Ok(Self { base_url, config })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn config(&self) -> &NetroConfig {
        &self.config
    }

    // ── Device info ─────────────────────────────────────────────────

    /// `GET /info.json?key=...`
    pub fn build_get_info(&self, key: &str) -> Result<HttpRequest> {
        let query = vec![key_param(key)?];
        Ok(self.get("info.json", query))
    }

    pub fn parse_get_info(&self, response: HttpResponse) -> Result<ApiResponse<DeviceInfo>> {
        let (meta, data) = open_envelope(response)?.into_parts()?;
        Ok(ApiResponse {
            meta,
            data: mapping::device_info(data)?,
        })
    }

    // ── Schedules / moistures / events / sensor data ────────────────

    /// `GET /schedules.json?key=...&start_date=...&end_date=...&zones=[..]`
    pub fn build_get_schedules(
        &self,
        key: &str,
        range: DateRange,
        zones: Option<&[u32]>,
    ) -> Result<HttpRequest> {
        let mut query = vec![key_param(key)?];
        push_range(&mut query, range)?;
        push_zones(&mut query, zones)?;
        Ok(self.get("schedules.json", query))
    }

    pub fn parse_get_schedules(&self, response: HttpResponse) -> Result<ApiResponse<Vec<Schedule>>> {
        parse_list(response, "schedules")
    }

    /// `GET /moistures.json?key=...&start_date=...&end_date=...&zones=[..]`
    pub fn build_get_moistures(
        &self,
        key: &str,
        range: DateRange,
        zones: Option<&[u32]>,
    ) -> Result<HttpRequest> {
        let mut query = vec![key_param(key)?];
        push_range(&mut query, range)?;
        push_zones(&mut query, zones)?;
        Ok(self.get("moistures.json", query))
    }

    pub fn parse_get_moistures(&self, response: HttpResponse) -> Result<ApiResponse<Vec<Moisture>>> {
        parse_list(response, "moistures")
    }

    /// `GET /events.json?key=...&event=N&start_date=...&end_date=...`
    pub fn build_get_events(
        &self,
        key: &str,
        event: Option<EventKind>,
        range: DateRange,
    ) -> Result<HttpRequest> {
        let mut query = vec![key_param(key)?];
        if let Some(event) = event {
            query.push(("event".to_string(), event.code().to_string()));
        }
        push_range(&mut query, range)?;
        Ok(self.get("events.json", query))
    }

    pub fn parse_get_events(&self, response: HttpResponse) -> Result<ApiResponse<Vec<Event>>> {
        parse_list(response, "events")
    }

    /// `GET /sensor_data.json?key=...&start_date=...&end_date=...`
    pub fn build_get_sensor_data(&self, key: &str, range: DateRange) -> Result<HttpRequest> {
        let mut query = vec![key_param(key)?];
        push_range(&mut query, range)?;
        Ok(self.get("sensor_data.json", query))
    }

    pub fn parse_get_sensor_data(
        &self,
        response: HttpResponse,
    ) -> Result<ApiResponse<Vec<SensorReading>>> {
        parse_list(response, "sensor_data")
    }

    // ── Controller commands ─────────────────────────────────────────

    /// `POST /set_status.json`. `None` leaves the status unchanged.
    pub fn build_set_status(&self, key: &str, enabled: Option<bool>) -> Result<HttpRequest> {
        let body = SetStatusBody {
            key: checked_key(key)?,
            status: enabled.map(u8::from),
        };
        self.post("set_status.json", &body)
    }

    /// `POST /water.json`
    pub fn build_water(&self, key: &str, request: &WaterRequest) -> Result<HttpRequest> {
        if request.duration_minutes == 0 {
            return Err(NetroError::invalid("duration", "must be at least 1 minute"));
        }
        if let Some(zones) = &request.zones {
            check_zones(zones)?;
        }
        let body = WaterBody {
            key: checked_key(key)?,
            duration: request.duration_minutes,
            zones: request.zones.as_deref(),
            delay: request.delay_minutes,
            start_time: request.start_time.map(format_start_time),
        };
        self.post("water.json", &body)
    }

    /// `POST /stop_water.json`
    pub fn build_stop_water(&self, key: &str) -> Result<HttpRequest> {
        let body = KeyBody {
            key: checked_key(key)?,
        };
        self.post("stop_water.json", &body)
    }

    /// `POST /no_water.json` suspends watering for `days` days.
    pub fn build_no_water(&self, key: &str, days: u32) -> Result<HttpRequest> {
        if days == 0 {
            return Err(NetroError::invalid("days", "must be at least 1"));
        }
        let body = NoWaterBody {
            key: checked_key(key)?,
            days,
        };
        self.post("no_water.json", &body)
    }

    /// `POST /set_moisture.json`
    pub fn build_set_moisture(
        &self,
        key: &str,
        moisture: u8,
        zones: Option<&[u32]>,
    ) -> Result<HttpRequest> {
        if moisture > 100 {
            return Err(NetroError::invalid("moisture", "must be a percentage in 0..=100"));
        }
        if let Some(zones) = zones {
            check_zones(zones)?;
        }
        let body = SetMoistureBody {
            key: checked_key(key)?,
            moisture,
            zones,
        };
        self.post("set_moisture.json", &body)
    }

    /// `POST /report_weather.json`
    pub fn build_report_weather(&self, key: &str, report: &WeatherReport) -> Result<HttpRequest> {
        if report.rain_prob.is_some_and(|p| p > 100) {
            return Err(NetroError::invalid("rain_prob", "must be a percentage in 0..=100"));
        }
        let body = WeatherBody {
            key: checked_key(key)?,
            date: format_date(report.date),
            condition: report.condition.map(|c| c.code()),
            rain: report.rain,
            rain_prob: report.rain_prob,
            temp: report.temp,
        };
        self.post("report_weather.json", &body)
    }

    /// Shared parser for every command endpoint; the payload is not used.
    pub fn parse_command(&self, response: HttpResponse) -> Result<Meta> {
        Ok(open_envelope(response)?.meta)
    }

    // ── Request helpers ─────────────────────────────────────────────

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    fn headers(&self, method: HttpMethod) -> Vec<(String, String)> {
        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        if method == HttpMethod::Post {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        headers.extend(self.config.extra_headers.iter().cloned());
        headers
    }

    fn get(&self, path: &str, query: Vec<(String, String)>) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: self.url(path),
            query,
            headers: self.headers(HttpMethod::Get),
            body: None,
            timeout: Some(self.config.default_timeout),
        }
    }

    fn post(&self, path: &str, body: &impl Serialize) -> Result<HttpRequest> {
        let body = serde_json::to_string(body).map_err(|e| NetroError::Unexpected { source: e.into() })?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: self.url(path),
            query: Vec::new(),
            headers: self.headers(HttpMethod::Post),
            body: Some(body),
            timeout: Some(self.config.default_timeout),
        })
    }
}

// ── Validation and encoding ─────────────────────────────────────────

fn checked_key(key: &str) -> Result<&str> {
    if key.trim().is_empty() {
        return Err(NetroError::invalid("key", "device serial must not be empty"));
    }
    Ok(key)
}

fn key_param(key: &str) -> Result<(String, String)> {
    Ok(("key".to_string(), checked_key(key)?.to_string()))
}

fn check_zones(zones: &[u32]) -> Result<()> {
    if zones.iter().any(|&z| z == 0) {
        return Err(NetroError::invalid("zones", "zone indexes are 1-based"));
    }
    Ok(())
}

fn push_range(query: &mut Vec<(String, String)>, range: DateRange) -> Result<()> {
    if let (Some(start), Some(end)) = (range.start, range.end) {
        if start > end {
            return Err(NetroError::invalid("start_date", "must not be after end_date"));
        }
    }
    if let Some(start) = range.start {
        query.push(("start_date".to_string(), format_date(start)));
    }
    if let Some(end) = range.end {
        query.push(("end_date".to_string(), format_date(end)));
    }
    Ok(())
}

/// Zone filters travel as a JSON array in the query string: `zones=[1,2]`.
fn push_zones(query: &mut Vec<(String, String)>, zones: Option<&[u32]>) -> Result<()> {
    if let Some(zones) = zones {
        check_zones(zones)?;
        let encoded = serde_json::to_string(zones).map_err(|e| NetroError::Unexpected { source: e.into() })?;
        query.push(("zones".to_string(), encoded));
    }
    Ok(())
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn format_start_time(time: NaiveDateTime) -> String {
    time.format(START_TIME_FORMAT).to_string()
}

// ── Response pipeline ───────────────────────────────────────────────

/// Status code, JSON, then envelope status. Returns an OK envelope.
fn open_envelope(response: HttpResponse) -> Result<Envelope> {
    if !response.is_success() {
        warn!(status = response.status, "Netro request failed");
        return Err(NetroError::Http {
            status: response.status,
            body: response.body,
        });
    }

    let value: Value = match response.json() {
        Ok(value) => value,
        Err(source) => {
            return Err(NetroError::Decode {
                source,
                body: response.body,
            })
        }
    };

    let envelope = Envelope::from_value(value)?;
    debug!(
        tid = envelope.meta.tid.as_deref().unwrap_or("-"),
        token_remaining = envelope.meta.token_remaining,
        "Netro envelope received"
    );

    envelope.into_result().inspect_err(|err| {
        warn!(error = %err, "Netro API returned ERROR");
    })
}

fn parse_list<T: serde::de::DeserializeOwned>(
    response: HttpResponse,
    key: &str,
) -> Result<ApiResponse<Vec<T>>> {
    let (meta, data) = open_envelope(response)?.into_parts()?;
    Ok(ApiResponse {
        meta,
        data: mapping::list(data, key)?,
    })
}
