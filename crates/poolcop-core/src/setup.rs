// ── Entry setup and teardown ──
//
// A config entry becomes live by building a coordinator, gating on its
// first refresh, publishing entities, and starting the poll loop.
// Unloading reverses that.

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::client::StatusClient;
use crate::coordinator::Coordinator;
use crate::entity::{PoolCopEntity, build_entities};
use crate::error::CoreError;
use crate::flow::ENTRY_TITLE;

/// A persisted PoolCop configuration.
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    pub entry_id: String,
    pub title: String,
    /// The PoolCop device id.
    pub unique_id: String,
    pub api_key: SecretString,
}

impl ConfigEntry {
    /// New entry with a fresh entry id and the default title.
    pub fn new(unique_id: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            entry_id: Uuid::new_v4().simple().to_string(),
            title: ENTRY_TITLE.to_owned(),
            unique_id: unique_id.into(),
            api_key,
        }
    }
}

/// Destination for entities created during setup.
pub trait EntityRegistry {
    fn add_entities(&mut self, entities: Vec<PoolCopEntity>);
}

impl EntityRegistry for Vec<PoolCopEntity> {
    fn add_entities(&mut self, entities: Vec<PoolCopEntity>) {
        self.extend(entities);
    }
}

#[derive(Debug, Error)]
pub enum SetupError {
    /// Transient; the host should retry setup later.
    #[error("PoolCop not ready: {message}")]
    NotReady { message: String },

    /// The stored key was refused; retrying will not help.
    #[error("PoolCop credential rejected: {message}")]
    InvalidCredential { message: String },
}

impl From<CoreError> for SetupError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthenticationFailed { message } => Self::InvalidCredential { message },
            CoreError::NotReady { message } => Self::NotReady { message },
            other => Self::NotReady {
                message: other.to_string(),
            },
        }
    }
}

/// A set-up entry with its running coordinator.
pub struct LoadedEntry<C: StatusClient> {
    entry: ConfigEntry,
    coordinator: Coordinator<C>,
}

impl<C: StatusClient> LoadedEntry<C> {
    pub fn entry(&self) -> &ConfigEntry {
        &self.entry
    }

    pub fn coordinator(&self) -> &Coordinator<C> {
        &self.coordinator
    }

    /// Stop polling and release the client. Always succeeds.
    pub async fn unload(self) -> bool {
        self.coordinator.shutdown().await;
        info!(entry_id = %self.entry.entry_id, "PoolCop entry unloaded");
        true
    }
}

/// Bring `entry` online.
///
/// Entities are published only after the first refresh succeeds, so none
/// ever observes an empty coordinator. On failure the client has already
/// been released and nothing was registered.
pub async fn setup_entry<C, R>(
    entry: ConfigEntry,
    client: C,
    registry: &mut R,
    update_interval: Duration,
) -> Result<LoadedEntry<C>, SetupError>
where
    C: StatusClient,
    R: EntityRegistry + ?Sized,
{
    debug!(poolcop_id = %entry.unique_id, "setting up PoolCop entry");
    let coordinator = Coordinator::new(client, update_interval);
    coordinator.first_refresh().await?;

    let entities = build_entities(&entry.unique_id, &coordinator.reader());
    let count = entities.len();
    registry.add_entities(entities);
    coordinator.start().await;

    info!(poolcop_id = %entry.unique_id, entities = count, "PoolCop entry set up");
    Ok(LoadedEntry { entry, coordinator })
}
