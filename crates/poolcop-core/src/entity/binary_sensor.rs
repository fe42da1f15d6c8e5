// ── Binary sensors ──
//
// On/off readings: equipment running, valve open, optional modules fitted.

use serde::Serialize;

use super::value::truthy;
use super::{DeviceInfo, EntityState, Platform, entity_id, unique_id};
use crate::snapshot::StatusSnapshot;
use crate::stream::SnapshotReader;

/// Icon shown while on, icon shown while off.
pub type OnOffIcons = (&'static str, &'static str);

pub const PUMP_ICONS: OnOffIcons = ("mdi:pump", "mdi:pump-off");
pub const VALVE_ICONS: OnOffIcons = ("mdi:valve-open", "mdi:valve-closed");
pub const FILTER_CYCLE_ICONS: OnOffIcons = ("mdi:sync", "mdi:sync-off");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BinarySensorDeviceClass {
    Running,
    Opening,
}

/// Static description of one binary sensor.
#[derive(Debug)]
pub struct BinarySensorEntityDescription {
    pub key: &'static str,
    pub name: &'static str,
    pub device_class: BinarySensorDeviceClass,
    /// Dotted path below the `PoolCop` root.
    pub path: &'static str,
    pub is_on_fn: fn(&StatusSnapshot, &str) -> Option<bool>,
    pub on_off_icons: OnOffIcons,
}

impl BinarySensorEntityDescription {
    /// Evaluate against a snapshot. `None` when there is no snapshot or
    /// the path is absent.
    pub fn is_on(&self, data: Option<&StatusSnapshot>) -> Option<bool> {
        data.and_then(|snapshot| (self.is_on_fn)(snapshot, self.path))
    }

    pub fn icon(&self, is_on: bool) -> &'static str {
        if is_on {
            self.on_off_icons.0
        } else {
            self.on_off_icons.1
        }
    }
}

/// Truthiness of the value at `path`.
pub fn truthy_at(data: &StatusSnapshot, path: &str) -> Option<bool> {
    data.status_value(path).map(truthy)
}

const fn running(
    key: &'static str,
    name: &'static str,
    path: &'static str,
    on_off_icons: OnOffIcons,
) -> BinarySensorEntityDescription {
    BinarySensorEntityDescription {
        key,
        name,
        device_class: BinarySensorDeviceClass::Running,
        path,
        is_on_fn: truthy_at,
        on_off_icons,
    }
}

pub static BINARY_SENSORS: &[BinarySensorEntityDescription] = &[
    running("pump", "Pump", "status.pump", PUMP_ICONS),
    BinarySensorEntityDescription {
        key: "watervalve",
        name: "Watervalve",
        device_class: BinarySensorDeviceClass::Opening,
        path: "status.watervalve",
        is_on_fn: truthy_at,
        on_off_icons: VALVE_ICONS,
    },
    running("ph_control", "pH Pump", "status.ph_control", PUMP_ICONS),
    running("orp_control", "Cl Pump", "status.orp_control", PUMP_ICONS),
    running("aux1", "aux 1", "status.aux1", FILTER_CYCLE_ICONS),
    running("aux2", "aux 2", "status.aux2", FILTER_CYCLE_ICONS),
    running("aux3", "aux 3", "status.aux3", FILTER_CYCLE_ICONS),
    running("aux4", "aux 4", "status.aux4", FILTER_CYCLE_ICONS),
    running("aux5", "aux 5", "status.aux5", FILTER_CYCLE_ICONS),
    running("aux6", "aux 6", "status.aux6", FILTER_CYCLE_ICONS),
    running("orp_installed", "ORP control installed", "conf.orp", FILTER_CYCLE_ICONS),
    running("pH_installed", "pH control installed", "conf.pH", FILTER_CYCLE_ICONS),
    running(
        "waterlevel_installed",
        "Waterlevel control installed",
        "conf.waterlevel",
        FILTER_CYCLE_ICONS,
    ),
    running("ioniser_installed", "Ioniser installed", "conf.ioniser", FILTER_CYCLE_ICONS),
    running("autochlor_installed", "Autochlor installed", "conf.autochlor", FILTER_CYCLE_ICONS),
    running("air_installed", "Air installed", "conf.air", FILTER_CYCLE_ICONS),
];

// ── Entity ───────────────────────────────────────────────────────

/// A binary sensor bound to one device and one coordinator.
#[derive(Debug, Clone)]
pub struct BinarySensorEntity {
    description: &'static BinarySensorEntityDescription,
    poolcop_id: String,
    unique_id: String,
    reader: SnapshotReader,
}

impl BinarySensorEntity {
    pub fn new(
        description: &'static BinarySensorEntityDescription,
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

    pub fn description(&self) -> &'static BinarySensorEntityDescription {
        self.description
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn entity_id(&self) -> String {
        entity_id(Platform::BinarySensor, &self.unique_id)
    }

    pub fn is_on(&self) -> Option<bool> {
        self.description.is_on(self.reader.load().as_deref())
    }

    /// Icon for the current state. An unknown state shows the off icon.
    pub fn icon(&self) -> &'static str {
        self.description.icon(self.is_on().unwrap_or(false))
    }

    pub fn available(&self) -> bool {
        self.reader.load().is_some()
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo::new(&self.poolcop_id, self.reader.load().as_deref())
    }

    pub fn state(&self) -> EntityState {
        let snapshot = self.reader.load();
        let is_on = self.description.is_on(snapshot.as_deref());
        let icon = self.description.icon(is_on.unwrap_or(false));
        EntityState {
            entity_id: self.entity_id(),
            unique_id: self.unique_id.clone(),
            platform: Platform::BinarySensor,
            key: self.description.key,
            name: self.description.name,
            state: match is_on {
                Some(true) => "on".into(),
                Some(false) => "off".into(),
                None => "unknown".into(),
            },
            value: is_on.map(super::SensorValue::Boolean),
            device_class: Some(self.description.device_class.to_string()),
            unit: None,
            icon: Some(icon),
            available: snapshot.is_some(),
        }
    }
}
