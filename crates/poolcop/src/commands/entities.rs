//! Sensor and binary sensor listings.

use tabled::Tabled;

use poolcop_core::{EntityState, Platform, PoolCopEntity, SnapshotReader, build_entities};

use crate::cli::GlobalOpts;
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::fetch_once;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct SensorRow {
    #[tabled(rename = "Key")]
    key: &'static str,
    #[tabled(rename = "Name")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Unit")]
    unit: &'static str,
    #[tabled(rename = "Class")]
    class: String,
}

#[derive(Tabled)]
struct BinarySensorRow {
    #[tabled(rename = "Key")]
    key: &'static str,
    #[tabled(rename = "Name")]
    name: &'static str,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Icon")]
    icon: &'static str,
}

fn sensor_row(s: &EntityState, color: bool) -> SensorRow {
    SensorRow {
        key: s.key,
        name: s.name,
        value: output::paint_state(&s.state, color),
        unit: s.unit.unwrap_or(""),
        class: s.device_class.clone().unwrap_or_default(),
    }
}

fn binary_row(s: &EntityState, color: bool) -> BinarySensorRow {
    BinarySensorRow {
        key: s.key,
        name: s.name,
        state: output::paint_state(&s.state, color),
        icon: s.icon.unwrap_or(""),
    }
}

fn plain_line(s: &EntityState) -> String {
    format!("{}\t{}", s.key, s.state)
}

/// Evaluate every entity of `platform` against the reader.
pub fn states(poolcop_id: &str, reader: &SnapshotReader, platform: Platform) -> Vec<EntityState> {
    build_entities(poolcop_id, reader)
        .iter()
        .filter(|e| e.platform() == platform)
        .map(PoolCopEntity::state)
        .collect()
}

async fn fetch_states(resolved: &Resolved, platform: Platform) -> Result<Vec<EntityState>, CliError> {
    let fetched = fetch_once(resolved).await?;
    let reader = SnapshotReader::fixed(Some((*fetched.snapshot).clone()));
    Ok(states(&fetched.poolcop_id, &reader, platform))
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn sensors(resolved: &Resolved, global: &GlobalOpts) -> Result<(), CliError> {
    let data = fetch_states(resolved, Platform::Sensor).await?;
    let color = output::should_color(&global.color);
    let out = output::render_list(&global.output, &data, |s| sensor_row(s, color), plain_line)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn binary_sensors(resolved: &Resolved, global: &GlobalOpts) -> Result<(), CliError> {
    let data = fetch_states(resolved, Platform::BinarySensor).await?;
    let color = output::should_color(&global.color);
    let out = output::render_list(&global.output, &data, |s| binary_row(s, color), plain_line)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolcop_core::StatusSnapshot;
    use serde_json::json;

    fn reader() -> SnapshotReader {
        SnapshotReader::fixed(Some(StatusSnapshot::new(json!({
            "PoolCop": {
                "status": { "pump": 1, "poolcop": 3 },
                "temperature": { "water": 24.5 }
            }
        }))))
    }

    #[test]
    fn states_are_filtered_by_platform() {
        let binary = states("1234", &reader(), Platform::BinarySensor);
        assert!(binary.iter().all(|s| s.platform == Platform::BinarySensor));
        let pump = binary.iter().find(|s| s.key == "pump").unwrap();
        assert_eq!(pump.state, "on");

        let sensors = states("1234", &reader(), Platform::Sensor);
        let water = sensors.iter().find(|s| s.key == "temperature_water").unwrap();
        assert_eq!(plain_line(water), "temperature_water\t24.5");
    }

    #[test]
    fn missing_values_render_unknown() {
        let sensors = states("1234", &reader(), Platform::Sensor);
        let orp = sensors.iter().find(|s| s.key == "orp").unwrap();
        let row = sensor_row(orp, false);
        assert_eq!(row.value, "unknown");
        assert_eq!(row.unit, "");
    }
}
