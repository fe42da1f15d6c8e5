use thiserror::Error;

/// Top-level error type for the `poolcop-api` crate.
///
/// Covers every failure mode of the PoolCopilot cloud API: key rejection,
/// token handling, transport, and payload decoding. `poolcop-core` folds
/// these into its own coarser taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The API key was rejected by the token endpoint.
    #[error("Invalid API key")]
    InvalidApiKey,

    /// A freshly issued token was rejected by the status endpoint.
    #[error("Access token rejected by PoolCopilot")]
    TokenRejected,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error that is neither a connect failure nor a timeout.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API host could not be reached (refused or unresolvable).
    #[error("Connection error: {0}")]
    Connection(String),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Too many requests for the current token window.
    #[error("Rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    // ── API ─────────────────────────────────────────────────────────
    /// Non-success HTTP response from the API.
    #[error("PoolCopilot API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Lifecycle ───────────────────────────────────────────────────
    /// The client was closed and can no longer issue requests.
    #[error("Client has been closed")]
    Closed,
}

impl Error {
    /// Returns `true` if the API key itself was refused.
    ///
    /// This is the only permanent failure: the user has to enter a new key.
    pub fn is_invalid_key(&self) -> bool {
        matches!(self, Self::InvalidApiKey)
    }

    /// Returns `true` for connection-class failures (transport, timeout, TLS).
    pub fn is_connection(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            Self::Connection(_) | Self::Timeout { .. } | Self::Tls(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying on the next poll.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::TokenRejected => true,
            Self::Api { status, .. } => *status >= 500,
            other => other.is_connection(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn invalid_key_is_permanent() {
        let err = Error::InvalidApiKey;
        assert!(err.is_invalid_key());
        assert!(!err.is_connection());
        assert!(!err.is_transient());
    }

    #[test]
    fn server_errors_are_transient_but_not_connection_class() {
        let err = Error::Api {
            status: 503,
            message: "maintenance".into(),
        };
        assert!(err.is_transient());
        assert!(!err.is_connection());

        let client_err = Error::Api {
            status: 400,
            message: "bad request".into(),
        };
        assert!(!client_err.is_transient());
    }

    #[test]
    fn connection_variants_are_connection_class() {
        assert!(Error::Connection("refused".into()).is_connection());
        assert!(Error::Timeout { timeout_secs: 5 }.is_connection());
        assert!(!Error::Closed.is_connection());
    }
}
