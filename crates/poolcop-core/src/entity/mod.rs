// ── Entities ──
//
// Descriptor tables plus the wrappers that evaluate them. Every entity
// belongs to exactly one device (the PoolCop) and reads from exactly one
// coordinator through a `SnapshotReader`.

pub mod binary_sensor;
pub mod sensor;
pub mod value;

use serde::Serialize;

use crate::snapshot::StatusSnapshot;
use crate::stream::SnapshotReader;

pub use binary_sensor::{BINARY_SENSORS, BinarySensorEntity, BinarySensorEntityDescription};
pub use sensor::{SENSORS, SensorEntity, SensorEntityDescription};
pub use value::SensorValue;

/// Integration domain; prefixes unique ids and device identifiers.
pub const DOMAIN: &str = "poolcop";
pub const MANUFACTURER: &str = "PCFR";
pub const DEVICE_NAME: &str = "PoolCop";
pub const ATTRIBUTION: &str = "Data provided by PoolCop";
const CONFIGURATION_URL: &str = "https://poolcopilot.com/mypoolcop/select/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    BinarySensor,
    Sensor,
}

/// `poolcop_{poolcop_id}_{key}`.
pub fn unique_id(poolcop_id: &str, key: &str) -> String {
    format!("{DOMAIN}_{poolcop_id}_{key}")
}

/// `{platform}.{unique_id}`.
pub fn entity_id(platform: Platform, unique_id: &str) -> String {
    format!("{platform}.{unique_id}")
}

// ── DeviceInfo ───────────────────────────────────────────────────

/// The single logical device all entities attach to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<(String, String)>,
    pub name: String,
    pub manufacturer: String,
    pub configuration_url: String,
    /// Firmware version from the latest snapshot, if any.
    pub sw_version: Option<String>,
    pub entry_type: &'static str,
}

impl DeviceInfo {
    pub fn new(poolcop_id: &str, snapshot: Option<&StatusSnapshot>) -> Self {
        Self {
            identifiers: vec![(DOMAIN.to_owned(), poolcop_id.to_owned())],
            name: DEVICE_NAME.to_owned(),
            manufacturer: MANUFACTURER.to_owned(),
            configuration_url: format!("{CONFIGURATION_URL}{poolcop_id}"),
            sw_version: snapshot.and_then(StatusSnapshot::firmware_version),
            entry_type: "service",
        }
    }
}

// ── EntityState ──────────────────────────────────────────────────

/// Point-in-time view of one entity, suitable for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub entity_id: String,
    pub unique_id: String,
    pub platform: Platform,
    pub key: &'static str,
    pub name: &'static str,
    /// `on`/`off` for binary sensors, the rendered value for sensors,
    /// `unknown` when there is nothing to show.
    pub state: String,
    pub value: Option<SensorValue>,
    pub device_class: Option<String>,
    pub unit: Option<&'static str>,
    pub icon: Option<&'static str>,
    pub available: bool,
}

// ── PoolCopEntity ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum PoolCopEntity {
    BinarySensor(BinarySensorEntity),
    Sensor(SensorEntity),
}

impl PoolCopEntity {
    pub fn platform(&self) -> Platform {
        match self {
            Self::BinarySensor(_) => Platform::BinarySensor,
            Self::Sensor(_) => Platform::Sensor,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::BinarySensor(e) => e.description().key,
            Self::Sensor(e) => e.description().key,
        }
    }

    pub fn unique_id(&self) -> &str {
        match self {
            Self::BinarySensor(e) => e.unique_id(),
            Self::Sensor(e) => e.unique_id(),
        }
    }

    pub fn entity_id(&self) -> String {
        match self {
            Self::BinarySensor(e) => e.entity_id(),
            Self::Sensor(e) => e.entity_id(),
        }
    }

    pub fn available(&self) -> bool {
        match self {
            Self::BinarySensor(e) => e.available(),
            Self::Sensor(e) => e.available(),
        }
    }

    pub fn device_info(&self) -> DeviceInfo {
        match self {
            Self::BinarySensor(e) => e.device_info(),
            Self::Sensor(e) => e.device_info(),
        }
    }

    pub fn state(&self) -> EntityState {
        match self {
            Self::BinarySensor(e) => e.state(),
            Self::Sensor(e) => e.state(),
        }
    }
}

/// One entity per descriptor, binary sensors first.
pub fn build_entities(poolcop_id: &str, reader: &SnapshotReader) -> Vec<PoolCopEntity> {
    let binary = BINARY_SENSORS.iter().map(|d| {
        PoolCopEntity::BinarySensor(BinarySensorEntity::new(d, poolcop_id, reader.clone()))
    });
    let sensors = SENSORS
        .iter()
        .map(|d| PoolCopEntity::Sensor(SensorEntity::new(d, poolcop_id, reader.clone())));
    binary.chain(sensors).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn unique_ids_follow_domain_pattern() {
        assert_eq!(unique_id("1234", "pump"), "poolcop_1234_pump");
        assert_eq!(
            entity_id(Platform::Sensor, "poolcop_1234_orp"),
            "sensor.poolcop_1234_orp"
        );
    }

    #[test]
    fn build_entities_covers_every_descriptor_once() {
        let entities = build_entities("1234", &SnapshotReader::fixed(None));
        assert_eq!(entities.len(), BINARY_SENSORS.len() + SENSORS.len());
        let ids: HashSet<_> = entities.iter().map(PoolCopEntity::entity_id).collect();
        assert_eq!(ids.len(), entities.len());
        assert!(entities.iter().all(|e| !e.available()));
    }

    #[test]
    fn device_info_carries_firmware_version() {
        let snap = StatusSnapshot::new(json!({ "PoolCop": { "network": { "version": "44.3.1" } } }));
        let info = DeviceInfo::new("1234", Some(&snap));
        assert_eq!(info.identifiers, vec![("poolcop".to_owned(), "1234".to_owned())]);
        assert_eq!(
            info.configuration_url,
            "https://poolcopilot.com/mypoolcop/select/1234"
        );
        assert_eq!(info.manufacturer, "PCFR");
        assert_eq!(info.sw_version.as_deref(), Some("44.3.1"));
        assert_eq!(info.entry_type, "service");

        assert_eq!(DeviceInfo::new("1234", None).sw_version, None);
    }

    #[test]
    fn entities_share_the_same_device() {
        let reader = SnapshotReader::fixed(None);
        let entities = build_entities("42", &reader);
        let first = entities[0].device_info();
        assert!(entities.iter().all(|e| e.device_info() == first));
    }
}
