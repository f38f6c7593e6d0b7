//! In-memory imitation of the Netro Public API (NPA v1).
//!
//! Every endpoint answers HTTP 200 with the vendor envelope; failures are
//! reported as `"status": "ERROR"` with an `errors` array, the way the real
//! service does. Each call costs one token from the device's daily budget.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

pub const API_PREFIX: &str = "/npa/v1";
pub const TOKEN_LIMIT: i64 = 2000;

pub const SENSOR_SERIAL: &str = "SENS0000AAAA";
pub const CONTROLLER_SERIAL: &str = "CTRL0000BBBB";
pub const PIXIE_SERIAL: &str = "PIXI0000CCCC";

const INVALID_KEY: i64 = 1;
const CALL_LIMIT: i64 = 2;
const INVALID_DEVICE: i64 = 3;
const PARAMETER: i64 = 5;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// ---------------------------------------------------------------------------
// Wire models
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Zone {
    pub ith: u32,
    pub name: String,
    pub enabled: bool,
    pub smart: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Schedule {
    pub id: i64,
    pub zone: u32,
    pub status: String,
    pub source: String,
    pub start_time: String,
    pub end_time: String,
    pub local_date: String,
    pub local_start_time: String,
    pub local_end_time: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Moisture {
    pub id: i64,
    pub zone: u32,
    pub date: String,
    pub moisture: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub event: u32,
    pub time: String,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SensorReading {
    pub id: i64,
    pub time: String,
    pub local_date: String,
    pub local_time: String,
    pub moisture: f64,
    pub sunlight: f64,
    pub celsius: f64,
    pub fahrenheit: f64,
    pub battery_level: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeatherEntry {
    pub date: String,
    pub condition: Option<u8>,
    pub rain: Option<f64>,
    pub rain_prob: Option<u8>,
    pub temp: Option<f64>,
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Sensor {
    pub serial: String,
    pub name: String,
    pub status: String,
    pub battery_level: f64,
    pub readings: Vec<SensorReading>,
}

#[derive(Clone, Debug)]
pub struct Controller {
    pub serial: String,
    pub name: String,
    pub status: String,
    pub zones: Vec<Zone>,
    /// Present only on battery-powered units.
    pub battery_level: Option<f64>,
    pub schedules: Vec<Schedule>,
    pub moistures: Vec<Moisture>,
    pub events: Vec<Event>,
    pub weather: Vec<WeatherEntry>,
    pub no_water_until: Option<NaiveDate>,
}

#[derive(Clone, Debug)]
pub enum Device {
    Sensor(Sensor),
    Controller(Controller),
}

#[derive(Clone, Debug)]
struct Slot {
    device: Device,
    tokens_remaining: i64,
    last_active: String,
}

#[derive(Debug, Default)]
pub struct Store {
    slots: HashMap<String, Slot>,
    next_id: i64,
}

impl Store {
    pub fn empty() -> Self {
        Self::default()
    }

    /// One sensor, one six-zone mains controller and one battery controller.
    pub fn seeded() -> Self {
        let mut store = Self::empty();
        store.add_sensor(SENSOR_SERIAL, "Lawn sensor", 0.63);
        store.add_controller(CONTROLLER_SERIAL, "Garden", 6, None);
        store.add_controller(PIXIE_SERIAL, "Balcony", 1, Some(0.82));
        store
    }

    pub fn add_sensor(&mut self, serial: &str, name: &str, battery_level: f64) {
        let now = Utc::now().naive_utc();
        let readings = (0..3)
            .map(|i| {
                let at = now - Duration::hours(i);
                let celsius = 18.0 + i as f64;
                SensorReading {
                    id: self.next_id(),
                    time: at.format(TIME_FORMAT).to_string(),
                    local_date: at.format("%Y-%m-%d").to_string(),
                    local_time: at.format("%H:%M:%S").to_string(),
                    moisture: 30.0 + i as f64,
                    sunlight: 1200.0,
                    celsius,
                    fahrenheit: celsius * 9.0 / 5.0 + 32.0,
                    battery_level,
                }
            })
            .collect();
        self.insert(
            serial,
            Device::Sensor(Sensor {
                serial: serial.to_string(),
                name: name.to_string(),
                status: "ONLINE".to_string(),
                battery_level,
                readings,
            }),
        );
    }

    pub fn add_controller(&mut self, serial: &str, name: &str, zones: u32, battery_level: Option<f64>) {
        let zones = (1..=zones)
            .map(|ith| Zone {
                ith,
                name: format!("Zone {ith}"),
                enabled: true,
                smart: "SMART".to_string(),
            })
            .collect();
        self.insert(
            serial,
            Device::Controller(Controller {
                serial: serial.to_string(),
                name: name.to_string(),
                status: "ONLINE".to_string(),
                zones,
                battery_level,
                schedules: Vec::new(),
                moistures: Vec::new(),
                events: Vec::new(),
                weather: Vec::new(),
                no_water_until: None,
            }),
        );
    }

    /// Override the remaining token budget of a device.
    pub fn set_tokens(&mut self, serial: &str, remaining: i64) {
        if let Some(slot) = self.slots.get_mut(serial) {
            slot.tokens_remaining = remaining;
        }
    }

    pub fn device(&self, serial: &str) -> Option<&Device> {
        self.slots.get(serial).map(|s| &s.device)
    }

    fn insert(&mut self, serial: &str, device: Device) {
        self.slots.insert(
            serial.to_string(),
            Slot {
                device,
                tokens_remaining: TOKEN_LIMIT,
                last_active: Utc::now().naive_utc().format(TIME_FORMAT).to_string(),
            },
        );
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    app_with(Store::seeded())
}

pub fn app_with(store: Store) -> Router {
    router(Arc::new(RwLock::new(store)))
}

pub fn router(db: Db) -> Router {
    let api = Router::new()
        .route("/info.json", get(get_info))
        .route("/schedules.json", get(get_schedules))
        .route("/moistures.json", get(get_moistures))
        .route("/events.json", get(get_events))
        .route("/sensor_data.json", get(get_sensor_data))
        .route("/set_status.json", post(set_status))
        .route("/water.json", post(water))
        .route("/stop_water.json", post(stop_water))
        .route("/no_water.json", post(no_water))
        .route("/set_moisture.json", post(set_moisture))
        .route("/report_weather.json", post(report_weather));
    Router::new().nest(API_PREFIX, api).with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, store: Store) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(store)).await
}

// ---------------------------------------------------------------------------
// Envelope helpers
// ---------------------------------------------------------------------------

type Failure = (i64, String);

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn meta(tokens_remaining: Option<i64>, last_active: Option<&str>) -> Value {
    let now = now();
    let tid = format!("{}_{}", now.and_utc().timestamp(), &Uuid::new_v4().simple().to_string()[..8]);
    let reset = (now.date() + Duration::days(1)).and_hms_opt(0, 0, 0).unwrap_or(now);
    json!({
        "time": now.format(TIME_FORMAT).to_string(),
        "tid": tid,
        "version": "1.0",
        "token_limit": TOKEN_LIMIT,
        "token_remaining": tokens_remaining,
        "last_active": last_active,
        "token_reset": reset.format(TIME_FORMAT).to_string(),
    })
}

fn error(meta: Value, (code, message): Failure) -> Json<Value> {
    Json(json!({
        "status": "ERROR",
        "meta": meta,
        "errors": [{"code": code, "message": message}],
    }))
}

/// Look up the device, charge one token, then run `f` against it.
async fn call<F>(db: &Db, endpoint: &str, key: &str, f: F) -> Json<Value>
where
    F: FnOnce(&mut Device, &mut i64) -> Result<Value, Failure>,
{
    info!(endpoint, key, "NPA call");
    let mut store = db.write().await;
    let mut next_id = store.next_id;

    let Some(slot) = store.slots.get_mut(key) else {
        return error(meta(None, None), (INVALID_KEY, format!("Invalid key : {key}")));
    };
    if slot.tokens_remaining <= 0 {
        return error(
            meta(Some(0), Some(&slot.last_active)),
            (CALL_LIMIT, "Exceed call limit".to_string()),
        );
    }
    slot.tokens_remaining -= 1;
    slot.last_active = now().format(TIME_FORMAT).to_string();

    let result = f(&mut slot.device, &mut next_id);
    let meta = meta(Some(slot.tokens_remaining), Some(&slot.last_active));
    store.next_id = next_id;

    match result {
        Ok(data) => Json(json!({"status": "OK", "meta": meta, "data": data})),
        Err(failure) => error(meta, failure),
    }
}

fn invalid_device() -> Failure {
    (INVALID_DEVICE, "Invalid device or sensor".to_string())
}

fn parameter(message: &str) -> Failure {
    (PARAMETER, format!("Parameter error : {message}"))
}

fn controller(device: &mut Device) -> Result<&mut Controller, Failure> {
    match device {
        Device::Controller(c) => Ok(c),
        Device::Sensor(_) => Err(invalid_device()),
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ApiQuery {
    pub key: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub zones: Option<String>,
    pub event: Option<u32>,
}

impl ApiQuery {
    fn in_range(&self, date: &str) -> bool {
        let date = &date[..date.len().min(10)];
        self.start_date.as_deref().is_none_or(|s| date >= s)
            && self.end_date.as_deref().is_none_or(|e| date <= e)
    }

    fn zone_filter(&self) -> Result<Option<Vec<u32>>, Failure> {
        match &self.zones {
            None => Ok(None),
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(|_| parameter("zones")),
        }
    }
}

fn check_date(raw: Option<&str>, name: &str) -> Result<(), Failure> {
    match raw {
        Some(s) if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_err() => Err(parameter(name)),
        _ => Ok(()),
    }
}

fn check_range(q: &ApiQuery) -> Result<(), Failure> {
    check_date(q.start_date.as_deref(), "start_date")?;
    check_date(q.end_date.as_deref(), "end_date")
}

async fn get_info(State(db): State<Db>, Query(q): Query<ApiQuery>) -> Json<Value> {
    call(&db, "info", &q.key, |device, _| {
        Ok(match device {
            Device::Sensor(s) => json!({"sensor": {
                "name": s.name,
                "serial": s.serial,
                "status": s.status,
                "version": "3.0",
                "sw_version": "3.0.5",
                "last_active": s.readings.first().map(|r| r.time.clone()),
                "battery_level": s.battery_level,
            }}),
            Device::Controller(c) => {
                let mut device = json!({
                    "name": c.name,
                    "serial": c.serial,
                    "status": c.status,
                    "version": "1.2",
                    "sw_version": "1.1.1",
                    "last_active": now().format(TIME_FORMAT).to_string(),
                    "zone_num": c.zones.len(),
                    "zones": c.zones,
                });
                if let Some(level) = c.battery_level {
                    device["battery_level"] = json!(level);
                }
                json!({"device": device})
            }
        })
    })
    .await
}

async fn get_schedules(State(db): State<Db>, Query(q): Query<ApiQuery>) -> Json<Value> {
    call(&db, "schedules", &q.key, |device, _| {
        check_range(&q)?;
        let zones = q.zone_filter()?;
        let c = controller(device)?;
        let schedules: Vec<&Schedule> = c
            .schedules
            .iter()
            .filter(|s| q.in_range(&s.local_date))
            .filter(|s| zones.as_ref().is_none_or(|z| z.contains(&s.zone)))
            .collect();
        Ok(json!({"schedules": schedules}))
    })
    .await
}

async fn get_moistures(State(db): State<Db>, Query(q): Query<ApiQuery>) -> Json<Value> {
    call(&db, "moistures", &q.key, |device, _| {
        check_range(&q)?;
        let zones = q.zone_filter()?;
        let c = controller(device)?;
        let moistures: Vec<&Moisture> = c
            .moistures
            .iter()
            .filter(|m| q.in_range(&m.date))
            .filter(|m| zones.as_ref().is_none_or(|z| z.contains(&m.zone)))
            .collect();
        Ok(json!({"moistures": moistures}))
    })
    .await
}

async fn get_events(State(db): State<Db>, Query(q): Query<ApiQuery>) -> Json<Value> {
    call(&db, "events", &q.key, |device, _| {
        check_range(&q)?;
        if q.event.is_some_and(|e| !(1..=4).contains(&e)) {
            return Err(parameter("event"));
        }
        let c = controller(device)?;
        let events: Vec<&Event> = c
            .events
            .iter()
            .filter(|e| q.in_range(&e.time))
            .filter(|e| q.event.is_none_or(|kind| e.event == kind))
            .collect();
        Ok(json!({"events": events}))
    })
    .await
}

async fn get_sensor_data(State(db): State<Db>, Query(q): Query<ApiQuery>) -> Json<Value> {
    call(&db, "sensor_data", &q.key, |device, _| {
        check_range(&q)?;
        let Device::Sensor(s) = device else {
            return Err(invalid_device());
        };
        let readings: Vec<&SensorReading> = s.readings.iter().filter(|r| q.in_range(&r.local_date)).collect();
        Ok(json!({"sensor_data": readings}))
    })
    .await
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct KeyBody {
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusBody {
    pub key: String,
    pub status: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct WaterBody {
    pub key: String,
    pub duration: u32,
    pub zones: Option<Vec<u32>>,
    pub delay: Option<u32>,
    pub start_time: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NoWaterBody {
    pub key: String,
    pub days: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SetMoistureBody {
    pub key: String,
    pub moisture: u8,
    pub zones: Option<Vec<u32>>,
}

#[derive(Debug, Deserialize)]
pub struct WeatherBody {
    pub key: String,
    pub date: String,
    pub condition: Option<u8>,
    pub rain: Option<f64>,
    pub rain_prob: Option<u8>,
    pub temp: Option<f64>,
}

/// `at` plus `minutes`, or `None` past the end of the calendar.
fn later(at: NaiveDateTime, minutes: u32) -> Option<NaiveDateTime> {
    Duration::try_minutes(i64::from(minutes)).and_then(|span| at.checked_add_signed(span))
}

/// Requested zones, or every enabled zone. Unknown indexes are rejected.
fn target_zones(c: &Controller, zones: &Option<Vec<u32>>) -> Result<Vec<u32>, Failure> {
    match zones {
        None => Ok(c.zones.iter().filter(|z| z.enabled).map(|z| z.ith).collect()),
        Some(list) => {
            if list.is_empty() || list.iter().any(|ith| !c.zones.iter().any(|z| z.ith == *ith)) {
                return Err(parameter("zones"));
            }
            Ok(list.clone())
        }
    }
}

async fn set_status(State(db): State<Db>, Json(body): Json<SetStatusBody>) -> Json<Value> {
    call(&db, "set_status", &body.key, |device, _| {
        let c = controller(device)?;
        match body.status {
            None => {}
            Some(0) => c.status = "STANDBY".to_string(),
            Some(1) => c.status = "ONLINE".to_string(),
            Some(_) => return Err(parameter("status")),
        }
        Ok(json!({}))
    })
    .await
}

async fn water(State(db): State<Db>, Json(body): Json<WaterBody>) -> Json<Value> {
    call(&db, "water", &body.key, |device, next_id| {
        let c = controller(device)?;
        if body.duration == 0 {
            return Err(parameter("duration"));
        }
        let zones = target_zones(c, &body.zones)?;
        let start = match &body.start_time {
            Some(raw) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
                .map_err(|_| parameter("start_time"))?,
            None => later(now(), body.delay.unwrap_or(0)).ok_or_else(|| parameter("delay"))?,
        };

        // Zones run one after another.
        let mut at = start;
        for zone in zones {
            let end = later(at, body.duration).ok_or_else(|| parameter("duration"))?;
            *next_id += 1;
            c.schedules.push(Schedule {
                id: *next_id,
                zone,
                status: "VALID".to_string(),
                source: "MANUAL".to_string(),
                start_time: at.format(TIME_FORMAT).to_string(),
                end_time: end.format(TIME_FORMAT).to_string(),
                local_date: at.format("%Y-%m-%d").to_string(),
                local_start_time: at.format("%H:%M:%S").to_string(),
                local_end_time: end.format("%H:%M:%S").to_string(),
            });
            *next_id += 1;
            c.events.push(Event {
                id: *next_id,
                event: 3,
                time: at.format(TIME_FORMAT).to_string(),
                message: format!("Zone {zone} manual watering scheduled"),
            });
            at = end;
        }
        Ok(json!({}))
    })
    .await
}

async fn stop_water(State(db): State<Db>, Json(body): Json<KeyBody>) -> Json<Value> {
    call(&db, "stop_water", &body.key, |device, _| {
        let c = controller(device)?;
        for schedule in c
            .schedules
            .iter_mut()
            .filter(|s| s.status == "VALID" || s.status == "EXECUTING")
        {
            schedule.status = "ABORTED".to_string();
        }
        if c.status == "WATERING" {
            c.status = "ONLINE".to_string();
        }
        Ok(json!({}))
    })
    .await
}

async fn no_water(State(db): State<Db>, Json(body): Json<NoWaterBody>) -> Json<Value> {
    call(&db, "no_water", &body.key, |device, _| {
        let c = controller(device)?;
        let days = body.days.unwrap_or(1);
        if days == 0 {
            return Err(parameter("days"));
        }
        let until = Duration::try_days(i64::from(days))
            .and_then(|span| now().date().checked_add_signed(span))
            .ok_or_else(|| parameter("days"))?;
        c.no_water_until = Some(until);
        let cutoff = until.format("%Y-%m-%d").to_string();
        for schedule in c
            .schedules
            .iter_mut()
            .filter(|s| s.status == "VALID" && s.local_date < cutoff)
        {
            schedule.status = "ABORTED".to_string();
        }
        Ok(json!({}))
    })
    .await
}

async fn set_moisture(State(db): State<Db>, Json(body): Json<SetMoistureBody>) -> Json<Value> {
    call(&db, "set_moisture", &body.key, |device, next_id| {
        let c = controller(device)?;
        if body.moisture > 100 {
            return Err(parameter("moisture"));
        }
        let zones = target_zones(c, &body.zones)?;
        let today = now().format("%Y-%m-%d").to_string();
        for zone in zones {
            *next_id += 1;
            c.moistures.push(Moisture {
                id: *next_id,
                zone,
                date: today.clone(),
                moisture: f64::from(body.moisture),
            });
        }
        Ok(json!({}))
    })
    .await
}

async fn report_weather(State(db): State<Db>, Json(body): Json<WeatherBody>) -> Json<Value> {
    call(&db, "report_weather", &body.key, |device, _| {
        let c = controller(device)?;
        check_date(Some(&body.date), "date")?;
        if body.condition.is_some_and(|v| v > 4) {
            return Err(parameter("condition"));
        }
        if body.rain_prob.is_some_and(|p| p > 100) {
            return Err(parameter("rain_prob"));
        }
        c.weather.push(WeatherEntry {
            date: body.date.clone(),
            condition: body.condition,
            rain: body.rain,
            rain_prob: body.rain_prob,
            temp: body.temp,
        });
        Ok(json!({}))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_store_has_one_of_each() {
        let store = Store::seeded();
        assert!(matches!(store.device(SENSOR_SERIAL), Some(Device::Sensor(_))));
        match store.device(CONTROLLER_SERIAL) {
            Some(Device::Controller(c)) => {
                assert_eq!(c.zones.len(), 6);
                assert!(c.battery_level.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
        match store.device(PIXIE_SERIAL) {
            Some(Device::Controller(c)) => {
                assert_eq!(c.zones.len(), 1);
                assert!(c.battery_level.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn sensor_readings_carry_battery_level() {
        let store = Store::seeded();
        let Some(Device::Sensor(s)) = store.device(SENSOR_SERIAL) else {
            panic!("sensor missing");
        };
        assert_eq!(s.readings.len(), 3);
        assert!(s.readings.iter().all(|r| r.battery_level == 0.63));
    }

    #[test]
    fn range_filter_compares_date_prefix() {
        let q = ApiQuery {
            key: String::new(),
            start_date: Some("2024-05-01".to_string()),
            end_date: Some("2024-05-07".to_string()),
            zones: Some("[1,3]".to_string()),
            event: None,
        };
        assert!(q.in_range("2024-05-01T08:00:00"));
        assert!(q.in_range("2024-05-07"));
        assert!(!q.in_range("2024-05-08"));
        assert_eq!(q.zone_filter().unwrap(), Some(vec![1, 3]));
    }

    #[test]
    fn malformed_zone_filter_is_a_parameter_error() {
        let q = ApiQuery {
            key: String::new(),
            start_date: None,
            end_date: None,
            zones: Some("1,3".to_string()),
            event: None,
        };
        assert_eq!(q.zone_filter().unwrap_err().0, PARAMETER);
    }

    #[test]
    fn later_stops_at_the_calendar_end() {
        let at = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(6, 0, 0).unwrap();
        assert_eq!(later(at, 90), at.checked_add_signed(Duration::minutes(90)));
        assert!(later(NaiveDateTime::MAX, 1).is_none());
    }

    #[test]
    fn meta_reports_token_budget() {
        let m = meta(Some(1999), Some("2024-05-01T00:00:00"));
        assert_eq!(m["token_limit"], TOKEN_LIMIT);
        assert_eq!(m["token_remaining"], 1999);
        assert_eq!(m["version"], "1.0");
        assert!(m["tid"].as_str().unwrap().contains('_'));
    }
}
