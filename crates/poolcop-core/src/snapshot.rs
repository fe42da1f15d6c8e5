// ── Status snapshots and path resolution ──
//
// A `StatusSnapshot` is the parsed body of one successful status poll.
// It is never mutated after construction; the coordinator replaces the
// whole snapshot on every refresh.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Top-level key under which the API nests all device state.
pub const ROOT_KEY: &str = "PoolCop";

/// Walk a dotted path through a JSON tree.
///
/// Object segments are looked up by key, array segments by decimal index.
/// Any missing key, out-of-range index, non-container intermediate, or a
/// `null` leaf resolves to `None`. Never panics.
pub fn resolve<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(tree, step)
        .filter(|value| !value.is_null())
}

fn step<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// One immutable capture of the device status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    status: Value,
    fetched_at: DateTime<Utc>,
}

impl StatusSnapshot {
    /// Capture a freshly fetched status tree, stamped with the current time.
    pub fn new(status: Value) -> Self {
        Self::with_timestamp(status, Utc::now())
    }

    pub fn with_timestamp(status: Value, fetched_at: DateTime<Utc>) -> Self {
        Self { status, fetched_at }
    }

    /// Resolve `path` beneath the [`ROOT_KEY`] object.
    ///
    /// `status_value("temperature.water")` reads `PoolCop.temperature.water`.
    pub fn status_value(&self, path: &str) -> Option<&Value> {
        self.status_value_with_prefix(ROOT_KEY, path)
    }

    /// Resolve `path` beneath an arbitrary top-level key.
    pub fn status_value_with_prefix(&self, prefix: &str, path: &str) -> Option<&Value> {
        let root = step(&self.status, prefix)?;
        resolve(root, path)
    }

    /// Firmware version string reported under `network.version`.
    pub fn firmware_version(&self) -> Option<String> {
        match self.status_value("network.version")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// The full status tree as received.
    pub fn raw(&self) -> &Value {
        &self.status
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}
