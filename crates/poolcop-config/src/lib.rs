//! Persistent configuration for PoolCop tools.
//!
//! TOML profiles (one per config entry), credential resolution (env +
//! keyring + plaintext), and translation to `poolcop_core` runtime types.
//! The CLI layers flag-aware overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use poolcop_core::{ConfigEntry, PoolCopConfig, SCAN_INTERVAL};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Keyring service name; accounts are `{profile}/api-key`.
pub const KEYRING_SERVICE: &str = "poolcop";
/// Prefix for environment overrides, e.g. `POOLCOP_DEFAULTS__TIMEOUT`.
pub const ENV_PREFIX: &str = "POOLCOP_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// One profile per PoolCop.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use: the explicit override, else the default.
    pub fn active_profile_name(&self, requested: Option<&str>) -> String {
        requested
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.into() })
    }

    /// Name of the profile already bound to `poolcop_id`, if any.
    pub fn profile_for_device(&self, poolcop_id: &str) -> Option<&str> {
        self.profiles
            .iter()
            .find(|(_, p)| p.poolcop_id.as_deref() == Some(poolcop_id))
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Refresh cadence in seconds for long-running commands.
    #[serde(default = "default_update_interval")]
    pub update_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            update_interval: default_update_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_update_interval() -> u64 {
    SCAN_INTERVAL.as_secs()
}

/// A configured PoolCop.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Device id learned during setup; the entry's unique id.
    pub poolcop_id: Option<String>,

    /// Display title.
    pub title: Option<String>,

    /// Stable entry identifier.
    pub entry_id: Option<String>,

    /// API key (plaintext; prefer keyring or env var).
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,

    /// Alternative API root.
    pub base_url: Option<String>,

    /// Path to an extra CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "poolcop", "poolcop").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("poolcop");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file + environment. A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    debug!(path = %path.display(), "config saved");
    Ok(())
}

// ── Credential resolution (without CLI flags) ───────────────────────

fn keyring_entry(profile_name: &str) -> keyring::Result<keyring::Entry> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/api-key"))
}

/// Resolve an API key from the credential chain (no CLI flag step).
pub fn resolve_api_key(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's api_key_env → env var lookup
    if let Some(ref env_name) = profile.api_key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref key) = profile.api_key {
        return Ok(SecretString::from(key.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store an API key in the system keyring.
pub fn store_api_key(profile_name: &str, api_key: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)
        .and_then(|entry| entry.set_password(api_key))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

/// Remove a profile's keyring entry. Missing entries are ignored.
pub fn delete_api_key(profile_name: &str) {
    if let Ok(entry) = keyring_entry(profile_name) {
        let _ = entry.delete_credential();
    }
}

// ── Translation to runtime types ────────────────────────────────────

/// Build a `PoolCopConfig` from a profile, with `defaults` filling gaps.
pub fn profile_to_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<PoolCopConfig, ConfigError> {
    let api_key = resolve_api_key(profile, profile_name)?;
    build_config(api_key, Some(profile), defaults)
}

/// Runtime config for an already-resolved key. Without a profile only
/// `defaults` apply.
pub fn build_config(
    api_key: SecretString,
    profile: Option<&Profile>,
    defaults: &Defaults,
) -> Result<PoolCopConfig, ConfigError> {
    let mut config = PoolCopConfig::new(api_key);
    config.update_interval = Duration::from_secs(defaults.update_interval);

    let timeout = profile.and_then(|p| p.timeout).unwrap_or(defaults.timeout);
    if timeout == 0 {
        return Err(ConfigError::Validation {
            field: "timeout".into(),
            reason: "must be at least 1 second".into(),
        });
    }
    config.timeout = Duration::from_secs(timeout);

    let Some(profile) = profile else {
        return Ok(config);
    };
    if let Some(ref base_url) = profile.base_url {
        url::Url::parse(base_url).map_err(|_| ConfigError::Validation {
            field: "base_url".into(),
            reason: format!("invalid URL: {base_url}"),
        })?;
        config.base_url.clone_from(base_url);
    }
    config.ca_cert.clone_from(&profile.ca_cert);
    Ok(config)
}

/// Reconstruct the config entry a profile was created from.
pub fn profile_to_entry(profile: &Profile, profile_name: &str) -> Result<ConfigEntry, ConfigError> {
    let poolcop_id = profile
        .poolcop_id
        .clone()
        .ok_or_else(|| ConfigError::Validation {
            field: "poolcop_id".into(),
            reason: format!("profile '{profile_name}' has not completed setup"),
        })?;
    let api_key = resolve_api_key(profile, profile_name)?;

    let mut entry = ConfigEntry::new(poolcop_id, api_key);
    if let Some(ref id) = profile.entry_id {
        entry.entry_id.clone_from(id);
    }
    if let Some(ref title) = profile.title {
        entry.title.clone_from(title);
    }
    Ok(entry)
}

/// Profile recording a freshly created entry. The key is stored only if
/// `plaintext_key` is set; otherwise it is expected in the keyring.
pub fn entry_to_profile(entry: &ConfigEntry, plaintext_key: Option<String>) -> Profile {
    Profile {
        poolcop_id: Some(entry.unique_id.clone()),
        title: Some(entry.title.clone()),
        entry_id: Some(entry.entry_id.clone()),
        api_key: plaintext_key,
        ..Profile::default()
    }
}
