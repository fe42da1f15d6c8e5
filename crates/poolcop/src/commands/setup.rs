//! `poolcop setup`: validate an API key and save it as a profile.

use dialoguer::Select;
use secrecy::{ExposeSecret, SecretString};

use poolcop_config::{Config, entry_to_profile};
use poolcop_core::{ConfigEntry, ConfigFlow, FlowError, FlowResult, PoolCopConfig, UserInput};

use crate::cli::{GlobalOpts, SetupArgs};
use crate::error::CliError;

/// Prompts before giving up on an interactively entered key.
const MAX_ATTEMPTS: usize = 3;

fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn prompt_api_key() -> Result<SecretString, CliError> {
    let key = rpassword::prompt_password("PoolCopilot API key: ").map_err(prompt_err)?;
    let key = key.trim();
    if key.is_empty() {
        return Err(CliError::Validation {
            field: "api_key".into(),
            reason: "API key cannot be empty".into(),
        });
    }
    Ok(SecretString::from(key.to_owned()))
}

/// Ask where the key should live. `true` means the config file.
fn prompt_plaintext() -> Result<bool, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the API key?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;
    Ok(selection == 1)
}

/// Map a re-shown form to the error the user sees.
fn form_error(kind: Option<FlowError>, profile: &str) -> CliError {
    match kind {
        Some(FlowError::InvalidAuth) => CliError::AuthFailed {
            profile: profile.into(),
        },
        Some(FlowError::CannotConnect) => CliError::NotReady {
            message: "failed to connect to PoolCopilot".into(),
        },
        Some(FlowError::Unknown) | None => CliError::ApiError {
            code: "unknown".into(),
            message: "validation succeeded but no PoolCop id was reported".into(),
        },
    }
}

/// Reject a device already bound to another profile unless `force` is set.
fn check_unique(cfg: &Config, poolcop_id: &str, force: bool) -> Result<(), CliError> {
    match cfg.profile_for_device(poolcop_id) {
        Some(existing) if !force => Err(CliError::AlreadyConfigured {
            poolcop_id: poolcop_id.into(),
            profile: existing.into(),
        }),
        _ => Ok(()),
    }
}

pub async fn handle(args: &SetupArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = poolcop_config::load_config_or_default();
    let profile_name = args
        .name
        .clone()
        .unwrap_or_else(|| cfg.active_profile_name(global.profile.as_deref()));

    let mut template = poolcop_config::build_config(
        SecretString::from(String::new()),
        cfg.profiles.get(&profile_name),
        &cfg.defaults,
    )?;
    if let Some(ref url) = global.base_url {
        template.base_url.clone_from(url);
    }
    if let Some(timeout) = global.timeout {
        template.timeout = std::time::Duration::from_secs(timeout.max(1));
    }

    let flow = ConfigFlow::new(|api_key: &SecretString| {
        PoolCopConfig {
            api_key: api_key.clone(),
            ..template.clone()
        }
        .build_client()
    });

    let interactive = global.api_key.is_none();
    let mut attempt = 0;
    let (title, unique_id, input) = loop {
        attempt += 1;
        let api_key = match global.api_key {
            Some(ref key) => SecretString::from(key.clone()),
            None => prompt_api_key()?,
        };

        match flow.step_user(Some(UserInput { api_key })).await {
            FlowResult::CreateEntry {
                title,
                unique_id,
                data,
            } => break (title, unique_id, data),
            form => {
                let err = form_error(form.base_error(), &profile_name);
                if !interactive || attempt >= MAX_ATTEMPTS {
                    return Err(err);
                }
                eprintln!("✗ {err}");
            }
        }
    };

    check_unique(&cfg, &unique_id, args.force)?;

    let mut entry = ConfigEntry::new(unique_id, input.api_key);
    entry.title = title;

    let store_plaintext = args.plaintext || (interactive && prompt_plaintext()?);
    let plaintext = if store_plaintext {
        Some(entry.api_key.expose_secret().to_owned())
    } else {
        poolcop_config::store_api_key(&profile_name, entry.api_key.expose_secret())?;
        None
    };

    let mut profile = entry_to_profile(&entry, plaintext);
    profile.base_url.clone_from(&global.base_url);
    profile.timeout = global.timeout;

    // A forced replacement drops any other profile bound to this device.
    let stale: Vec<String> = cfg
        .profiles
        .iter()
        .filter(|(name, p)| {
            *name != &profile_name && p.poolcop_id.as_deref() == Some(entry.unique_id.as_str())
        })
        .map(|(name, _)| name.clone())
        .collect();
    for name in stale {
        cfg.profiles.remove(&name);
        poolcop_config::delete_api_key(&name);
        if cfg.default_profile.as_deref() == Some(name.as_str()) {
            cfg.default_profile = None;
        }
    }

    cfg.profiles.insert(profile_name.clone(), profile);
    if cfg.default_profile.is_none() || cfg.profiles.len() == 1 {
        cfg.default_profile = Some(profile_name.clone());
    }
    poolcop_config::save_config(&cfg)?;

    tracing::info!(poolcop_id = %entry.unique_id, profile = %profile_name, "profile saved");
    if !global.quiet {
        eprintln!("✓ {} {} saved as profile '{profile_name}'", entry.title, entry.unique_id);
        if store_plaintext {
            eprintln!("  API key stored in {}", poolcop_config::config_path().display());
        } else {
            eprintln!("  API key stored in system keyring");
        }
        eprintln!("\n  Try it: poolcop status");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use poolcop_config::Profile;

    fn config_with(name: &str, poolcop_id: &str) -> Config {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            name.into(),
            Profile {
                poolcop_id: Some(poolcop_id.into()),
                ..Profile::default()
            },
        );
        cfg
    }

    #[test]
    fn duplicate_device_is_rejected_without_force() {
        let cfg = config_with("pool", "1234");
        let err = check_unique(&cfg, "1234", false).unwrap_err();
        assert!(matches!(err, CliError::AlreadyConfigured { ref profile, .. } if profile == "pool"));
        assert!(check_unique(&cfg, "1234", true).is_ok());
        assert!(check_unique(&cfg, "5678", false).is_ok());
    }

    #[test]
    fn form_errors_map_to_exit_codes() {
        use crate::error::exit_code;
        assert_eq!(form_error(Some(FlowError::InvalidAuth), "p").exit_code(), exit_code::AUTH);
        assert_eq!(
            form_error(Some(FlowError::CannotConnect), "p").exit_code(),
            exit_code::CONNECTION
        );
        assert_eq!(form_error(Some(FlowError::Unknown), "p").exit_code(), exit_code::GENERAL);
    }
}
