//! Flag-aware wrappers over `poolcop-config`.
//!
//! This is the single boundary where CLI flags, profiles, and environment
//! variables are merged into a `PoolCopConfig`.

use std::time::Duration;

use poolcop_config::{Config, build_config, resolve_api_key};
use poolcop_core::PoolCopConfig;
use secrecy::SecretString;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolved runtime settings for one invocation.
pub struct Resolved {
    pub profile_name: String,
    pub config: PoolCopConfig,
    /// Device id recorded at setup, if the profile has one.
    pub poolcop_id: Option<String>,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.active_profile_name(global.profile.as_deref())
}

/// Merge flags over the active profile.
///
/// A `--api-key` flag (or `POOLCOP_API_KEY`) works without any profile;
/// otherwise the profile must exist and yield a credential.
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let cfg = poolcop_config::load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);
    let profile = cfg.profiles.get(&profile_name);

    let api_key = match (&global.api_key, profile) {
        (Some(key), _) => SecretString::from(key.clone()),
        (None, Some(profile)) => resolve_api_key(profile, &profile_name)?,
        (None, None) if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: crate::error::available_profiles(),
            });
        }
        (None, None) => {
            return Err(CliError::NoCredentials {
                profile: profile_name,
            });
        }
    };

    let mut config = build_config(api_key, profile, &cfg.defaults)?;
    if let Some(ref url) = global.base_url {
        config.base_url.clone_from(url);
    }
    if let Some(timeout) = global.timeout {
        config.timeout = Duration::from_secs(timeout.max(1));
    }

    Ok(Resolved {
        profile_name,
        config,
        poolcop_id: profile.and_then(|p| p.poolcop_id.clone()),
    })
}
