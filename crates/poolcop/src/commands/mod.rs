//! Command dispatch: bridges CLI args -> coordinator -> output formatting.

pub mod config_cmd;
pub mod entities;
pub mod query;
pub mod setup;
pub mod status;
pub mod watch;

use std::sync::Arc;

use poolcop_core::{Coordinator, CoordinatorState, CoreError, StatusSnapshot};

use crate::cli::{Command, GlobalOpts};
use crate::config::{self, Resolved};
use crate::error::CliError;

/// Result of a single poll.
pub struct Fetched {
    pub snapshot: Arc<StatusSnapshot>,
    pub poolcop_id: String,
    /// Coordinator health when the snapshot was taken.
    pub state: CoordinatorState,
}

/// Dispatch a data command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let resolved = config::resolve(global)?;
    tracing::debug!(profile = %resolved.profile_name, "resolved profile");

    let result = match cmd {
        Command::Watch(args) => watch::handle(&resolved, &args, global).await,
        Command::Status => status::handle(&resolved, global).await,
        Command::Device => status::device(&resolved, global).await,
        Command::Sensors => entities::sensors(&resolved, global).await,
        Command::BinarySensors => entities::binary_sensors(&resolved, global).await,
        Command::Get(args) => query::get(&resolved, &args, global).await,
        Command::Raw => query::raw(&resolved, global).await,
        // Handled before dispatch
        Command::Setup(_) | Command::Config(_) | Command::Completions(_) => Ok(()),
    };
    result.map_err(|e| e.for_profile(&resolved.profile_name))
}

/// Poll once: first refresh, capture the snapshot, device id and refresh
/// state, release.
pub async fn fetch_once(resolved: &Resolved) -> Result<Fetched, CliError> {
    let client = resolved.config.build_client()?;
    let (snapshot, reported_id, state) = Coordinator::oneshot(client, |c| async move {
        let snapshot = c.data().ok_or(CoreError::ClientClosed)?;
        Ok((snapshot, c.poolcop_id().await, c.state()))
    })
    .await?;

    Ok(Fetched {
        snapshot,
        poolcop_id: device_id(reported_id, resolved),
        state,
    })
}

/// Prefer the id the API reported; fall back to the one saved at setup.
fn device_id(reported: Option<String>, resolved: &Resolved) -> String {
    reported
        .or_else(|| resolved.poolcop_id.clone())
        .unwrap_or_else(|| "unknown".into())
}
