// ── Sensors ──
//
// Numeric, textual, and timestamp readings.

use serde::Serialize;

use super::value::SensorValue;
use super::{ATTRIBUTION, DeviceInfo, EntityState, Platform, entity_id, unique_id};
use crate::snapshot::StatusSnapshot;
use crate::stream::SnapshotReader;

pub const UNIT_CELSIUS: &str = "°C";
pub const UNIT_PASCAL: &str = "Pa";
pub const UNIT_VOLT: &str = "V";
pub const UNIT_PH: &str = "pH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SensorDeviceClass {
    Temperature,
    Pressure,
    Voltage,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SensorStateClass {
    Measurement,
}

/// Static description of one sensor.
#[derive(Debug)]
pub struct SensorEntityDescription {
    pub key: &'static str,
    pub name: &'static str,
    pub device_class: Option<SensorDeviceClass>,
    pub state_class: Option<SensorStateClass>,
    pub native_unit_of_measurement: Option<&'static str>,
    /// Dotted path below the `PoolCop` root.
    pub path: &'static str,
    pub value_fn: fn(&StatusSnapshot, &str) -> Option<SensorValue>,
}

impl SensorEntityDescription {
    /// Evaluate against a snapshot. `None` when there is no snapshot, the
    /// path is absent, or a timestamp fails to parse.
    pub fn value(&self, data: Option<&StatusSnapshot>) -> Option<SensorValue> {
        data.and_then(|snapshot| (self.value_fn)(snapshot, self.path))
    }
}

/// The raw leaf at `path`, unconverted.
pub fn value_at(data: &StatusSnapshot, path: &str) -> Option<SensorValue> {
    data.status_value(path).and_then(SensorValue::from_json)
}

/// The leaf at `path`, parsed as an instant.
pub fn timestamp_at(data: &StatusSnapshot, path: &str) -> Option<SensorValue> {
    data.status_value(path).and_then(SensorValue::timestamp)
}

const fn measurement(
    key: &'static str,
    name: &'static str,
    device_class: Option<SensorDeviceClass>,
    unit: Option<&'static str>,
    path: &'static str,
) -> SensorEntityDescription {
    SensorEntityDescription {
        key,
        name,
        device_class,
        state_class: Some(SensorStateClass::Measurement),
        native_unit_of_measurement: unit,
        path,
        value_fn: value_at,
    }
}

const fn plain(key: &'static str, name: &'static str, path: &'static str) -> SensorEntityDescription {
    SensorEntityDescription {
        key,
        name,
        device_class: None,
        state_class: None,
        native_unit_of_measurement: None,
        path,
        value_fn: value_at,
    }
}

const fn history(key: &'static str, name: &'static str, path: &'static str) -> SensorEntityDescription {
    SensorEntityDescription {
        key,
        name,
        device_class: Some(SensorDeviceClass::Timestamp),
        state_class: None,
        native_unit_of_measurement: None,
        path,
        value_fn: timestamp_at,
    }
}

pub static SENSORS: &[SensorEntityDescription] = &[
    measurement(
        "temperature_water",
        "Water temperature",
        Some(SensorDeviceClass::Temperature),
        Some(UNIT_CELSIUS),
        "temperature.water",
    ),
    measurement(
        "temperature_air",
        "Air temperature",
        Some(SensorDeviceClass::Temperature),
        Some(UNIT_CELSIUS),
        "temperature.air",
    ),
    measurement(
        "pressure",
        "Pressure",
        Some(SensorDeviceClass::Pressure),
        Some(UNIT_PASCAL),
        "pressure",
    ),
    measurement("pH", "pH", None, Some(UNIT_PH), "pH"),
    measurement("orp", "Oxidation-Reduction Potential", None, None, "orp"),
    measurement("ioniser", "Ioniser", None, None, "ioniser"),
    measurement(
        "voltage",
        "Voltage",
        Some(SensorDeviceClass::Voltage),
        Some(UNIT_VOLT),
        "voltage",
    ),
    plain("waterlevel", "Waterlevel", "waterlevel"),
    plain("valve_position", "Valve position", "status.valveposition"),
    plain("pump_speed", "Pump speed", "status.pumpspeed"),
    // Opaque operating-mode code reported by the controller.
    plain("poolcop", "Operating mode", "status.poolcop"),
    history("last_backwash", "Last backwash", "history.backwash"),
    history("last_refill", "Last refill", "history.refill"),
    history("last_ph_measure", "Last pH measure", "history.ph_measure"),
];

// ── Entity ───────────────────────────────────────────────────────

/// A sensor bound to one device and one coordinator.
#[derive(Debug, Clone)]
pub struct SensorEntity {
    description: &'static SensorEntityDescription,
    poolcop_id: String,
    unique_id: String,
    reader: SnapshotReader,
}

impl SensorEntity {
    pub fn new(
        description: &'static SensorEntityDescription,
        poolcop_id: &str,
        reader: SnapshotReader,
    ) -> Self {
        Self {
            description,
            poolcop_id: poolcop_id.to_owned(),
            unique_id: unique_id(poolcop_id, description.key),
            reader,
        }
    }

    pub fn description(&self) -> &'static SensorEntityDescription {
        self.description
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn entity_id(&self) -> String {
        entity_id(Platform::Sensor, &self.unique_id)
    }

    pub fn native_value(&self) -> Option<SensorValue> {
        self.description.value(self.reader.load().as_deref())
    }

    pub fn available(&self) -> bool {
        self.reader.load().is_some()
    }

    pub fn attribution(&self) -> &'static str {
        ATTRIBUTION
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo::new(&self.poolcop_id, self.reader.load().as_deref())
    }

    pub fn state(&self) -> EntityState {
        let snapshot = self.reader.load();
        let value = self.description.value(snapshot.as_deref());
        EntityState {
            entity_id: self.entity_id(),
            unique_id: self.unique_id.clone(),
            platform: Platform::Sensor,
            key: self.description.key,
            name: self.description.name,
            state: value
                .as_ref()
                .map_or_else(|| "unknown".to_owned(), ToString::to_string),
            value,
            device_class: self.description.device_class.map(|c| c.to_string()),
            unit: self.description.native_unit_of_measurement,
            icon: None,
            available: snapshot.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashSet;

    fn description(key: &str) -> &'static SensorEntityDescription {
        SENSORS.iter().find(|d| d.key == key).unwrap()
    }

    fn snapshot() -> StatusSnapshot {
        StatusSnapshot::new(json!({
            "PoolCop": {
                "temperature": { "water": 26.5 },
                "pH": 7.2,
                "voltage": 12,
                "status": { "poolcop": 7, "valveposition": 1 },
                "history": {
                    "backwash": "2024-06-01T08:15:00+0200",
                    "refill": "not a date"
                }
            }
        }))
    }

    #[test]
    fn keys_are_unique() {
        let keys: HashSet<_> = SENSORS.iter().map(|d| d.key).collect();
        assert_eq!(keys.len(), SENSORS.len());
        assert_eq!(SENSORS.len(), 14);
    }

    #[test]
    fn passes_raw_values_through() {
        let snap = snapshot();
        assert_eq!(
            description("temperature_water").value(Some(&snap)),
            Some(SensorValue::Float(26.5))
        );
        assert_eq!(description("voltage").value(Some(&snap)), Some(SensorValue::Integer(12)));
        assert_eq!(description("poolcop").value(Some(&snap)), Some(SensorValue::Integer(7)));
    }

    #[test]
    fn missing_values_are_unknown() {
        let snap = snapshot();
        assert_eq!(description("temperature_air").value(Some(&snap)), None);
        assert_eq!(description("pressure").value(None), None);
    }

    #[test]
    fn history_values_parse_as_timestamps() {
        let snap = snapshot();
        let Some(SensorValue::Timestamp(ts)) = description("last_backwash").value(Some(&snap))
        else {
            panic!("expected a timestamp");
        };
        assert_eq!(ts.to_rfc3339(), "2024-06-01T08:15:00+02:00");
        assert_eq!(description("last_refill").value(Some(&snap)), None);

        let utc = StatusSnapshot::new(json!({
            "PoolCop": { "history": { "backwash": "2024-03-01T10:15:00+00:00" } }
        }));
        let Some(SensorValue::Timestamp(ts)) = description("last_backwash").value(Some(&utc))
        else {
            panic!("expected a timestamp");
        };
        assert_eq!(ts.timestamp(), 1_709_288_100);
        assert_eq!(ts.to_rfc3339(), "2024-03-01T10:15:00+00:00");

        let bare = StatusSnapshot::new(json!({ "PoolCop": { "temperature": { "water": 26.5 } } }));
        assert_eq!(description("last_backwash").value(Some(&bare)), None);
        assert_eq!(description("last_refill").value(Some(&bare)), None);
    }

    #[test]
    fn measurement_metadata() {
        let water = description("temperature_water");
        assert_eq!(water.device_class, Some(SensorDeviceClass::Temperature));
        assert_eq!(water.state_class, Some(SensorStateClass::Measurement));
        assert_eq!(water.native_unit_of_measurement, Some("°C"));
        assert_eq!(description("pH").native_unit_of_measurement, Some("pH"));
        assert_eq!(description("pressure").native_unit_of_measurement, Some("Pa"));
    }

    #[test]
    fn entity_state_renders_value() {
        let entity = SensorEntity::new(
            description("pH"),
            "1234",
            SnapshotReader::fixed(Some(snapshot())),
        );
        assert_eq!(entity.entity_id(), "sensor.poolcop_1234_pH");
        assert_eq!(entity.attribution(), "Data provided by PoolCop");
        let state = entity.state();
        assert_eq!(state.state, "7.2");
        assert_eq!(state.unit, Some("pH"));
        assert_eq!(state.value, Some(SensorValue::Float(7.2)));
    }
}
