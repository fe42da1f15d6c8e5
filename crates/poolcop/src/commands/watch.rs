//! Continuous polling: set the profile up as a live entry and print
//! entity changes until interrupted.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Local;
use futures_util::StreamExt;
use tokio::signal;

use poolcop_core::{
    ConfigEntry, CoordinatorState, EntityState, Platform, PoolCopEntity, flow, setup_entry,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

/// Which platforms to print.
fn wanted(args: &WatchArgs, platform: Platform) -> bool {
    match platform {
        Platform::BinarySensor => !args.sensors_only,
        Platform::Sensor => !args.binary_only,
    }
}

/// Entities whose rendered state differs from `previous`; updates `previous`.
fn diff(
    entities: &[PoolCopEntity],
    previous: &mut BTreeMap<String, String>,
) -> Vec<EntityState> {
    let mut changed = Vec::new();
    for state in entities.iter().map(PoolCopEntity::state) {
        if previous.get(&state.entity_id) != Some(&state.state) {
            previous.insert(state.entity_id.clone(), state.state.clone());
            changed.push(state);
        }
    }
    changed
}

fn print_changes(changes: &[EntityState], global: &GlobalOpts, color: bool) -> Result<(), CliError> {
    let stamp = Local::now().format("%H:%M:%S");
    for s in changes {
        let line = match global.output {
            OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(s)?,
            OutputFormat::Yaml => {
                output::render_single(&global.output, s, |_| String::new(), |_| String::new())?
            }
            OutputFormat::Plain => format!("{}\t{}", s.key, s.state),
            OutputFormat::Table => {
                let unit = s.unit.map(|u| format!(" {u}")).unwrap_or_default();
                format!(
                    "{stamp}  {:<32} {}{unit}",
                    s.name,
                    output::paint_state(&s.state, color)
                )
            }
        };
        output::print_output(&line, global.quiet);
    }
    Ok(())
}

/// Device id for the entry: the one saved at setup, else ask the API.
async fn entry_for(resolved: &Resolved) -> Result<ConfigEntry, CliError> {
    let api_key = resolved.config.api_key.clone();
    if let Some(ref id) = resolved.poolcop_id {
        return Ok(ConfigEntry::new(id.clone(), api_key));
    }

    let client = resolved.config.build_client()?;
    match flow::validate_input(&client).await {
        Ok(info) => Ok(ConfigEntry::new(info.unique_id, api_key)),
        Err(flow::FlowError::InvalidAuth) => Err(CliError::AuthFailed {
            profile: resolved.profile_name.clone(),
        }),
        Err(kind) => Err(CliError::NotReady {
            message: kind.to_string(),
        }),
    }
}

pub async fn handle(resolved: &Resolved, args: &WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let interval = args
        .interval
        .map_or(resolved.config.update_interval, Duration::from_secs);
    if interval.is_zero() {
        return Err(CliError::Validation {
            field: "interval".into(),
            reason: "must be at least 1 second".into(),
        });
    }

    let entry = entry_for(resolved).await?;
    let client = resolved.config.build_client()?;
    let mut registry: Vec<PoolCopEntity> = Vec::new();
    let loaded = setup_entry(entry, client, &mut registry, interval).await?;
    registry.retain(|e| wanted(args, e.platform()));

    let coordinator = loaded.coordinator().clone();
    let mut snapshots = coordinator.subscribe().into_stream();
    let mut states = coordinator.state_changes();
    let color = output::should_color(&global.color);
    let mut previous = BTreeMap::new();
    let mut last_state = coordinator.state();

    if !global.quiet {
        eprintln!(
            "Watching PoolCop {} every {}s (Ctrl-C to stop)",
            loaded.entry().unique_id,
            interval.as_secs()
        );
    }
    print_changes(&diff(&registry, &mut previous), global, color)?;

    let result = loop {
        tokio::select! {
            _ = signal::ctrl_c() => break Ok(()),
            snap = snapshots.next() => {
                if snap.is_none() {
                    break Ok(());
                }
                if let Err(e) = print_changes(&diff(&registry, &mut previous), global, color) {
                    break Err(e);
                }
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = *states.borrow_and_update();
                match (state, coordinator.last_failure()) {
                    (CoordinatorState::Failing, Some(failure)) => {
                        eprintln!("! refresh failed ({}x): {}", failure.consecutive, failure.message);
                    }
                    (CoordinatorState::Ready, _) if last_state == CoordinatorState::Failing => {
                        eprintln!("✓ refresh recovered");
                    }
                    _ => {}
                }
                last_state = state;
            }
        }
    };

    loaded.unload().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolcop_core::{SnapshotReader, StatusSnapshot, build_entities};
    use serde_json::json;

    fn args(binary_only: bool, sensors_only: bool) -> WatchArgs {
        WatchArgs {
            interval: None,
            binary_only,
            sensors_only,
        }
    }

    #[test]
    fn platform_filters() {
        assert!(wanted(&args(false, false), Platform::Sensor));
        assert!(!wanted(&args(true, false), Platform::Sensor));
        assert!(wanted(&args(true, false), Platform::BinarySensor));
        assert!(!wanted(&args(false, true), Platform::BinarySensor));
    }

    #[test]
    fn diff_reports_only_changed_states() {
        let snap = StatusSnapshot::new(json!({ "PoolCop": { "status": { "pump": 1 } } }));
        let entities = build_entities("1234", &SnapshotReader::fixed(Some(snap)));
        let mut previous = BTreeMap::new();

        let first = diff(&entities, &mut previous);
        assert_eq!(first.len(), entities.len());
        assert!(diff(&entities, &mut previous).is_empty());

        previous.insert("binary_sensor.poolcop_1234_pump".into(), "off".into());
        let changed = diff(&entities, &mut previous);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].state, "on");
    }
}
