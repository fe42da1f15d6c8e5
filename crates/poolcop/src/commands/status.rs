//! Status and device command handlers.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use poolcop_core::{CoordinatorState, DeviceInfo, EntityState, SnapshotReader, build_entities};

use crate::cli::GlobalOpts;
use crate::config::Resolved;
use crate::error::CliError;
use crate::output;

use super::{Fetched, fetch_once};

/// Readings shown in the status summary, in display order.
const HIGHLIGHTS: &[&str] = &[
    "temperature_water",
    "temperature_air",
    "pH",
    "orp",
    "pressure",
    "pump",
    "watervalve",
    "poolcop",
];

#[derive(Serialize)]
struct StatusReport {
    profile: String,
    state: CoordinatorState,
    fetched_at: DateTime<Utc>,
    device: DeviceInfo,
    readings: Vec<EntityState>,
}

fn detail(report: &StatusReport, color: bool) -> String {
    let mut lines = vec![
        format!("Profile:   {}", report.profile),
        format!("PoolCop:   {}", report.device.identifiers[0].1),
        format!(
            "Firmware:  {}",
            report.device.sw_version.as_deref().unwrap_or("-")
        ),
        format!("Refresh:   {}", report.state),
        format!(
            "Updated:   {}",
            report.fetched_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        ),
        String::new(),
    ];
    let width = report
        .readings
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(0);
    for reading in &report.readings {
        let unit = reading.unit.map(|u| format!(" {u}")).unwrap_or_default();
        lines.push(format!(
            "{:<width$}  {}{unit}",
            reading.name,
            output::paint_state(&reading.state, color),
        ));
    }
    lines.join("\n")
}

fn build_report(profile: &str, fetched: &Fetched) -> StatusReport {
    let reader = SnapshotReader::fixed(Some((*fetched.snapshot).clone()));
    let entities = build_entities(&fetched.poolcop_id, &reader);

    let readings = HIGHLIGHTS
        .iter()
        .filter_map(|key| entities.iter().find(|e| e.key() == *key))
        .map(poolcop_core::PoolCopEntity::state)
        .collect();

    StatusReport {
        profile: profile.to_owned(),
        state: fetched.state,
        fetched_at: fetched.snapshot.fetched_at(),
        device: DeviceInfo::new(&fetched.poolcop_id, Some(&fetched.snapshot)),
        readings,
    }
}

pub async fn handle(resolved: &Resolved, global: &GlobalOpts) -> Result<(), CliError> {
    let fetched = fetch_once(resolved).await?;
    let report = build_report(&resolved.profile_name, &fetched);

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &report,
        |r| detail(r, color),
        |r| {
            r.readings
                .iter()
                .map(|e| format!("{}={}", e.key, e.state))
                .collect::<Vec<_>>()
                .join("\n")
        },
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn device_detail(d: &DeviceInfo) -> String {
    let (domain, id) = &d.identifiers[0];
    [
        format!("Name:          {}", d.name),
        format!("Identifier:    {domain}/{id}"),
        format!("Manufacturer:  {}", d.manufacturer),
        format!("Firmware:      {}", d.sw_version.as_deref().unwrap_or("-")),
        format!("Type:          {}", d.entry_type),
        format!("Portal:        {}", d.configuration_url),
    ]
    .join("\n")
}

pub async fn device(resolved: &Resolved, global: &GlobalOpts) -> Result<(), CliError> {
    let fetched = fetch_once(resolved).await?;
    let info = DeviceInfo::new(&fetched.poolcop_id, Some(&fetched.snapshot));

    let out = output::render_single(&global.output, &info, device_detail, |d| {
        d.identifiers[0].1.clone()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
