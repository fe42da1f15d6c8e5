// ── Runtime connection configuration ──
//
// Describes how to reach PoolCopilot and how often to poll it. Carries the
// API key but never touches disk: the CLI resolves a profile and hands a
// `PoolCopConfig` in.

use std::path::PathBuf;
use std::time::Duration;

use poolcop_api::{DEFAULT_BASE_URL, PoolCopilotClient, TransportConfig};
use secrecy::SecretString;
use url::Url;

use crate::coordinator::SCAN_INTERVAL;
use crate::error::CoreError;

/// Configuration for one PoolCop entry.
#[derive(Debug, Clone)]
pub struct PoolCopConfig {
    /// Credential exchanged for short-lived tokens.
    pub api_key: SecretString,
    /// API root, normally [`DEFAULT_BASE_URL`].
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Refresh cadence. `Duration::ZERO` disables the background task.
    pub update_interval: Duration,
    /// Extra CA certificate to trust.
    pub ca_cert: Option<PathBuf>,
}

impl PoolCopConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: Duration::from_secs(30),
            update_interval: SCAN_INTERVAL,
            ca_cert: None,
        }
    }

    /// Parsed API root.
    pub fn url(&self) -> Result<Url, CoreError> {
        Url::parse(&self.base_url).map_err(|e| CoreError::Config {
            message: format!("invalid base URL '{}': {e}", self.base_url),
        })
    }

    /// Build the HTTP client this configuration describes.
    pub fn build_client(&self) -> Result<PoolCopilotClient, CoreError> {
        self.url()?;
        let transport = TransportConfig {
            ca_cert: self.ca_cert.clone(),
            ..TransportConfig::with_timeout(self.timeout)
        };
        Ok(PoolCopilotClient::with_base_url(
            &self.base_url,
            self.api_key.clone(),
            &transport,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_poll_at_scan_interval() {
        let config = PoolCopConfig::new(SecretString::from("key".to_owned()));
        assert_eq!(config.update_interval, Duration::from_secs(12));
        assert_eq!(config.url().unwrap().as_str(), DEFAULT_BASE_URL);
    }

    #[test]
    fn rejects_malformed_base_url() {
        let mut config = PoolCopConfig::new(SecretString::from("key".to_owned()));
        config.base_url = "not a url".into();
        assert!(matches!(config.build_client(), Err(CoreError::Config { .. })));
    }
}
