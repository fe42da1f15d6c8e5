//! Snapshot cache and entity layer between `poolcop-api` and consumers.
//!
//! This crate owns everything between the HTTP client and whatever renders
//! pool state:
//!
//! - **[`StatusSnapshot`]**: Immutable capture of one successful poll, with a
//!   total dotted-path resolver ([`StatusSnapshot::status_value`]) that turns
//!   missing branches into `None` instead of errors.
//!
//! - **[`Coordinator`]**: Owns the API client, polls on a fixed interval,
//!   swaps snapshots in atomically, and folds every failure into a uniform
//!   "update failed" signal while keeping the last good snapshot readable.
//!
//! - **[`entity`]**: Static descriptor tables for the binary sensors and
//!   sensors, plus the entity wrappers that evaluate them against the
//!   current snapshot on demand.
//!
//! - **[`ConfigFlow`]** / **[`setup_entry`]**: Turn an API key into a config
//!   entry, gate setup on the first refresh, and publish entities to an
//!   [`EntityRegistry`].

pub mod client;
pub mod config;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod flow;
pub mod setup;
pub mod snapshot;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::StatusClient;
pub use config::PoolCopConfig;
pub use coordinator::{Coordinator, CoordinatorState, SCAN_INTERVAL, UpdateFailure};
pub use entity::{
    BINARY_SENSORS, BinarySensorEntity, DeviceInfo, EntityState, Platform, PoolCopEntity,
    SENSORS, SensorEntity, SensorValue, build_entities,
};
pub use error::CoreError;
pub use flow::{ConfigFlow, EntryInfo, FlowError, FlowResult, UserInput, validate_input};
pub use setup::{ConfigEntry, EntityRegistry, LoadedEntry, SetupError, setup_entry};
pub use snapshot::{ROOT_KEY, StatusSnapshot, resolve};
pub use stream::{SnapshotReader, SnapshotStream, SnapshotWatchStream};
