//! CLI error types with miette diagnostics.
//!
//! Maps core, config, and setup errors into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use poolcop_config::ConfigError;
use poolcop_core::{CoreError, SetupError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach PoolCopilot")]
    #[diagnostic(
        code(poolcop::connection_failed),
        help(
            "Check your network connection and that poolcopilot.com is reachable.\n\
             Retry with -vv for request details."
        )
    )]
    ConnectionFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("PoolCop is not ready: {message}")]
    #[diagnostic(
        code(poolcop::not_ready),
        help("The first status request failed. This is usually transient; try again shortly.")
    )]
    NotReady { message: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("PoolCopilot rejected the API key for profile '{profile}'")]
    #[diagnostic(
        code(poolcop::auth_failed),
        help(
            "Copy the API key from your PoolCopilot account page.\n\
             Run: poolcop config set-key --profile {profile}"
        )
    )]
    AuthFailed { profile: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(poolcop::no_credentials),
        help(
            "Configure credentials with: poolcop setup\n\
             Or set the POOLCOP_API_KEY environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(poolcop::not_found),
        help("Run: poolcop {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("PoolCop {poolcop_id} is already configured as profile '{profile}'")]
    #[diagnostic(
        code(poolcop::already_configured),
        help("Use --force to replace it, or `poolcop config remove {profile}` first.")
    )]
    AlreadyConfigured { poolcop_id: String, profile: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error ({code}): {message}")]
    #[diagnostic(code(poolcop::api_error))]
    ApiError { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(poolcop::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(poolcop::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: poolcop setup"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(poolcop::config),
        help("Config file: {path}")
    )]
    Config { message: String, path: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(poolcop::timeout),
        help("Increase timeout with --timeout or try again later.")
    )]
    Timeout { seconds: u64 },

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    #[diagnostic(code(poolcop::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::NotReady { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::AlreadyConfigured { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the profile name to an authentication failure.
    pub fn for_profile(self, profile: &str) -> Self {
        match self {
            Self::AuthFailed { .. } => Self::AuthFailed {
                profile: profile.into(),
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed {
                source: reason.into(),
            },

            CoreError::AuthenticationFailed { .. } => CliError::AuthFailed {
                profile: "current".into(),
            },

            CoreError::NotReady { message } | CoreError::UpdateFailed { message } => {
                CliError::NotReady { message }
            }

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::ClientClosed => CliError::ApiError {
                code: "closed".into(),
                message: "client already released".into(),
            },

            CoreError::Api { message, status } => CliError::ApiError {
                code: status.map_or_else(|| "unknown".into(), |s| s.to_string()),
                message,
            },

            CoreError::Config { message } => CliError::Config {
                message,
                path: poolcop_config::config_path().display().to_string(),
            },
        }
    }
}

impl From<SetupError> for CliError {
    fn from(err: SetupError) -> Self {
        match err {
            SetupError::InvalidCredential { .. } => CliError::AuthFailed {
                profile: "current".into(),
            },
            SetupError::NotReady { message } => CliError::NotReady { message },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound {
                name,
                available: available_profiles(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
                path: poolcop_config::config_path().display().to_string(),
            },
        }
    }
}

/// Comma-separated profile names, or `(none)`.
pub fn available_profiles() -> String {
    let cfg = poolcop_config::load_config_or_default();
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
