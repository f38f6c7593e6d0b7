//! Async client core for the Netro Public API (irrigation controllers and
//! soil sensors).
//!
//! # Overview
//! `NetroApi` builds `HttpRequest` values and parses `HttpResponse` values
//! without touching the network. `NetroClient` runs those halves around a
//! caller-supplied `Transport`, so the embedding application decides which
//! HTTP stack, TLS and timeout policy to use.
//!
//! # Design
//! - Stateless: the client holds only its immutable configuration and the
//!   transport handle.
//! - Every failure is one `NetroError` variant; nothing is retried.
//! - Device kind is a `DeviceInfo` variant decided once at parse time.
//! - The library logs through `tracing` and never installs a subscriber.

pub mod api;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod http;
mod mapping;
pub mod types;

pub use api::NetroApi;
pub use client::NetroClient;
pub use config::NetroConfig;
pub use envelope::{ApiErrorDetail, ApiResponse, Envelope, Meta, ResponseStatus};
pub use error::{NetroError, Result};
pub use http::{BoxError, HttpMethod, HttpRequest, HttpResponse, Transport};
pub use types::{
    ControllerInfo, DateRange, DeviceInfo, DeviceKind, DeviceStatus, Event, EventKind, Moisture,
    Schedule, ScheduleSource, ScheduleStatus, SensorInfo, SensorReading, SmartMode, WaterRequest,
    WeatherCondition, WeatherReport, Zone,
};
