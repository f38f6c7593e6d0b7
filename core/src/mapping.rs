//! Maps the `data` object of an OK envelope into typed results.
//!
//! Deserialization failures are reported as `NetroError::Schema` with the
//! JSON path of the offending field (e.g. `data.device.zones`).

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{NetroError, Result};
use crate::types::{ControllerInfo, DeviceInfo, SensorInfo};

const SENSOR_KEY: &str = "sensor";
const DEVICE_KEY: &str = "device";

/// Deserialize `value`, reporting failures relative to `prefix`.
///
/// A missing required field is reported at the field itself
/// (`data.sensor.battery_level`), not at the object that lacks it.
pub(crate) fn decode<T: DeserializeOwned>(prefix: &str, value: Value) -> Result<T> {
    serde_path_to_error::deserialize(value).map_err(|err| {
        let path = err.path().to_string();
        let message = err.into_inner().to_string();
        let mut key = if path == "." {
            prefix.to_string()
        } else {
            format!("{prefix}.{path}")
        };
        if let Some(field) = missing_field(&message) {
            key = format!("{key}.{field}");
        }
        NetroError::Schema { key, message }
    })
}

/// Field name from serde's "missing field `name`" message.
fn missing_field(message: &str) -> Option<&str> {
    message.strip_prefix("missing field `")?.split('`').next()
}

/// Decide the device schema from the keys of `data`, then populate it.
pub(crate) fn device_info(mut data: Map<String, Value>) -> Result<DeviceInfo> {
    match (data.remove(SENSOR_KEY), data.remove(DEVICE_KEY)) {
        (Some(_), Some(_)) => Err(NetroError::Schema {
            key: "data".to_string(),
            message: "both `sensor` and `device` present".to_string(),
        }),
        (Some(sensor), None) => {
            let sensor: SensorInfo = decode("data.sensor", sensor)?;
            check_battery("data.sensor.battery_level", sensor.battery_level)?;
            Ok(DeviceInfo::Sensor(sensor))
        }
        (None, Some(device)) => {
            let controller: ControllerInfo = decode("data.device", device)?;
            check_controller(&controller)?;
            Ok(DeviceInfo::Controller(controller))
        }
        (None, None) => Err(NetroError::Schema {
            key: "data.device".to_string(),
            message: "missing field `device` (or `sensor`)".to_string(),
        }),
    }
}

/// Extract a list payload such as `data.schedules`.
pub(crate) fn list<T: DeserializeOwned>(mut data: Map<String, Value>, key: &str) -> Result<Vec<T>> {
    let prefix = format!("data.{key}");
    match data.remove(key) {
        Some(value) => decode(&prefix, value),
        None => Err(NetroError::missing(prefix)),
    }
}

fn check_battery(key: &str, level: f64) -> Result<()> {
    if (0.0..=1.0).contains(&level) {
        return Ok(());
    }
    Err(NetroError::Schema {
        key: key.to_string(),
        message: format!("{level} is outside [0.0, 1.0]"),
    })
}

fn check_controller(controller: &ControllerInfo) -> Result<()> {
    if let Some(zone_num) = controller.zone_num {
        if zone_num as usize != controller.zones.len() {
            return Err(NetroError::Schema {
                key: "data.device.zones".to_string(),
                message: format!(
                    "zone_num is {zone_num} but {} zones were listed",
                    controller.zones.len()
                ),
            });
        }
    }

    let mut seen = HashSet::new();
    for zone in &controller.zones {
        if zone.ith == 0 {
            return Err(NetroError::Schema {
                key: "data.device.zones.ith".to_string(),
                message: "zone index must be 1-based".to_string(),
            });
        }
        if !seen.insert(zone.ith) {
            return Err(NetroError::Schema {
                key: "data.device.zones.ith".to_string(),
                message: format!("duplicate zone index {}", zone.ith),
            });
        }
    }

    if let Some(level) = controller.battery_level {
        check_battery("data.device.battery_level", level)?;
    }
    Ok(())
}
