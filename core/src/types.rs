//! Domain types for the Netro API.
//!
//! # Design
//! Device kind is decided once, at parse time, and carried as the
//! `DeviceInfo` variant. Controllers do not declare their product line on
//! the wire; `ControllerInfo::kind` derives it from the payload values.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Soil sensor ("Whisperer").
    Sensor,
    /// AC-powered multi-zone controller ("Sprite").
    AcMultiZone,
    /// Battery-powered single-zone controller ("Pixie").
    BatterySingleZone,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceStatus {
    Standby,
    Setup,
    Online,
    Watering,
    Offline,
    Sleeping,
    Poweroff,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SmartMode {
    Smart,
    Assistant,
    Timer,
    #[serde(other)]
    Unknown,
}

/// One irrigation output of a controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// 1-based index, unique within the device.
    pub ith: u32,
    #[serde(default)]
    pub name: String,
    pub enabled: bool,
    pub smart: SmartMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorInfo {
    pub serial: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: DeviceStatus,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub sw_version: String,
    #[serde(default)]
    pub last_active: String,
    /// Fraction in `[0.0, 1.0]`.
    pub battery_level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerInfo {
    pub serial: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: DeviceStatus,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub sw_version: String,
    #[serde(default)]
    pub last_active: String,
    #[serde(default)]
    pub zone_num: Option<u32>,
    pub zones: Vec<Zone>,
    /// Only reported by battery-powered controllers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f64>,
}

impl ControllerInfo {
    /// Product line, inferred from the battery field and the zone count.
    ///
    /// The payload carries no type tag. Every battery unit is single-zone and
    /// every mains unit has several zones, so either signal marks the battery
    /// line: a one-zone controller is classified as battery-powered even when
    /// it omits `battery_level`. The zone count is `zone_num`, or the length
    /// of `zones` when `zone_num` is absent.
    pub fn kind(&self) -> DeviceKind {
        if self.battery_level.is_some() || self.zone_count() == 1 {
            DeviceKind::BatterySingleZone
        } else {
            DeviceKind::AcMultiZone
        }
    }

    pub fn zone_count(&self) -> usize {
        self.zone_num
            .map(|n| n as usize)
            .unwrap_or(self.zones.len())
    }

    pub fn zone(&self, ith: u32) -> Option<&Zone> {
        self.zones.iter().find(|z| z.ith == ith)
    }

    pub fn enabled_zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter().filter(|z| z.enabled)
    }
}

/// Result of `get_info`: exactly one of the two device schemas.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceInfo {
    Sensor(SensorInfo),
    Controller(ControllerInfo),
}

impl DeviceInfo {
    pub fn kind(&self) -> DeviceKind {
        match self {
            DeviceInfo::Sensor(_) => DeviceKind::Sensor,
            DeviceInfo::Controller(c) => c.kind(),
        }
    }

    pub fn serial(&self) -> &str {
        match self {
            DeviceInfo::Sensor(s) => &s.serial,
            DeviceInfo::Controller(c) => &c.serial,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            DeviceInfo::Sensor(s) => &s.name,
            DeviceInfo::Controller(c) => &c.name,
        }
    }

    pub fn status(&self) -> DeviceStatus {
        match self {
            DeviceInfo::Sensor(s) => s.status,
            DeviceInfo::Controller(c) => c.status,
        }
    }

    pub fn as_sensor(&self) -> Option<&SensorInfo> {
        match self {
            DeviceInfo::Sensor(s) => Some(s),
            DeviceInfo::Controller(_) => None,
        }
    }

    pub fn as_controller(&self) -> Option<&ControllerInfo> {
        match self {
            DeviceInfo::Controller(c) => Some(c),
            DeviceInfo::Sensor(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Schedules, moistures, events, sensor readings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScheduleStatus {
    Valid,
    Executing,
    Executed,
    Aborted,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScheduleSource {
    Smart,
    Fix,
    Manual,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: i64,
    pub zone: u32,
    pub status: ScheduleStatus,
    pub source: ScheduleSource,
    /// UTC, `YYYY-MM-DDTHH:MM:SS`.
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub local_date: String,
    #[serde(default)]
    pub local_start_time: String,
    #[serde(default)]
    pub local_end_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Moisture {
    pub id: i64,
    pub zone: u32,
    pub date: String,
    /// Percent.
    pub moisture: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DeviceOffline = 1,
    DeviceOnline = 2,
    ScheduleStart = 3,
    ScheduleEnd = 4,
}

impl EventKind {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(EventKind::DeviceOffline),
            2 => Some(EventKind::DeviceOnline),
            3 => Some(EventKind::ScheduleStart),
            4 => Some(EventKind::ScheduleEnd),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub event: u32,
    pub time: String,
    #[serde(default)]
    pub message: String,
}

impl Event {
    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_code(self.event)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub id: i64,
    pub time: String,
    #[serde(default)]
    pub local_date: String,
    #[serde(default)]
    pub local_time: String,
    #[serde(default)]
    pub moisture: Option<f64>,
    #[serde(default)]
    pub sunlight: Option<f64>,
    #[serde(default)]
    pub celsius: Option<f64>,
    #[serde(default)]
    pub fahrenheit: Option<f64>,
    #[serde(default)]
    pub battery_level: Option<f64>,
}

// ---------------------------------------------------------------------------
// Request inputs
// ---------------------------------------------------------------------------

/// Optional `start_date`/`end_date` filter. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn since(start: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn until(end: NaiveDate) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }
}

/// Manual watering order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaterRequest {
    pub duration_minutes: u32,
    /// `None` waters every enabled zone.
    pub zones: Option<Vec<u32>>,
    pub delay_minutes: Option<u32>,
    /// UTC.
    pub start_time: Option<NaiveDateTime>,
}

impl WaterRequest {
    pub fn minutes(duration_minutes: u32) -> Self {
        Self {
            duration_minutes,
            zones: None,
            delay_minutes: None,
            start_time: None,
        }
    }

    pub fn zones(mut self, zones: impl IntoIterator<Item = u32>) -> Self {
        self.zones = Some(zones.into_iter().collect());
        self
    }

    pub fn delay(mut self, minutes: u32) -> Self {
        self.delay_minutes = Some(minutes);
        self
    }

    pub fn at(mut self, start_time: NaiveDateTime) -> Self {
        self.start_time = Some(start_time);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherCondition {
    Clear = 0,
    Cloudy = 1,
    Rain = 2,
    Snow = 3,
    Wind = 4,
}

impl WeatherCondition {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Local weather observation fed back to the vendor's smart scheduling.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub date: NaiveDate,
    pub condition: Option<WeatherCondition>,
    /// Millimetres.
    pub rain: Option<f64>,
    /// Percent.
    pub rain_prob: Option<u8>,
    /// Celsius.
    pub temp: Option<f64>,
}

impl WeatherReport {
    pub fn on(date: NaiveDate) -> Self {
        Self {
            date,
            condition: None,
            rain: None,
            rain_prob: None,
            temp: None,
        }
    }
}
