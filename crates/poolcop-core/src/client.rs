// ── Status client seam ──
//
// The coordinator and config flow only need three things from a client:
// fetch the status tree, report the device id, and release resources.
// Abstracting them keeps both testable without an HTTP server.

use std::future::Future;

use poolcop_api::PoolCopilotClient;
use serde_json::Value;

/// Capability the coordinator polls.
pub trait StatusClient: Send + Sync + 'static {
    /// Fetch the current status tree.
    fn fetch_status(&self) -> impl Future<Output = Result<Value, poolcop_api::Error>> + Send;

    /// Device id bound to the credential, once known.
    fn poolcop_id(&self) -> Option<String>;

    /// Release connections. Called at most once by the coordinator.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

impl StatusClient for PoolCopilotClient {
    fn fetch_status(&self) -> impl Future<Output = Result<Value, poolcop_api::Error>> + Send {
        self.status()
    }

    fn poolcop_id(&self) -> Option<String> {
        PoolCopilotClient::poolcop_id(self)
    }

    fn close(&self) -> impl Future<Output = ()> + Send {
        PoolCopilotClient::close(self)
    }
}
