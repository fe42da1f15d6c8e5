// ── Core error types ──
//
// Errors surfaced by the coordinator, config flow, and entry setup.
// Consumers see a small set of outcomes ("update failed", "not ready",
// "authentication failed") rather than HTTP details; the
// `From<poolcop_api::Error>` impl performs that translation.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Refresh outcomes ─────────────────────────────────────────────
    /// Any failure of a refresh other than a rejected credential.
    #[error("Error communicating with PoolCopilot API: {message}")]
    UpdateFailed { message: String },

    /// The first refresh failed; setup should be retried later.
    #[error("PoolCop is not ready: {message}")]
    NotReady { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to PoolCopilot: {reason}")]
    ConnectionFailed { reason: String },

    #[error("PoolCopilot request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The coordinator's client has already been released.
    #[error("PoolCopilot client is closed")]
    ClientClosed,

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Whether this error means the API key itself was refused.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<poolcop_api::Error> for CoreError {
    fn from(err: poolcop_api::Error) -> Self {
        use poolcop_api::Error as Api;

        match err {
            Api::InvalidApiKey => CoreError::AuthenticationFailed {
                message: "Invalid API key".into(),
            },
            Api::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            Api::Closed => CoreError::ClientClosed,
            Api::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            Api::RateLimited { retry_after_secs } => CoreError::Api {
                message: format!("rate limited, retry after {retry_after_secs}s"),
                status: Some(429),
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid PoolCopilot URL: {e}"),
            },
            ref other if other.is_connection() => CoreError::ConnectionFailed {
                reason: other.to_string(),
            },
            other => CoreError::Api {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl CoreError {
    /// Fold a refresh failure into the coordinator's two outcomes.
    ///
    /// A refused credential stays distinguishable so setup can stop
    /// retrying; everything else becomes [`CoreError::UpdateFailed`].
    pub(crate) fn from_refresh(err: poolcop_api::Error) -> Self {
        if err.is_invalid_key() {
            CoreError::AuthenticationFailed {
                message: err.to_string(),
            }
        } else {
            CoreError::UpdateFailed {
                message: err.to_string(),
            }
        }
    }
}
