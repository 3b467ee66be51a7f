//! CLI configuration, a thin wrapper around `greennet_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--host, --port, --gateway, --timeout).

use greennet_api::mqtt::MqttSettings;
use greennet_config::Profile;
use greennet_core::GatewayConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use greennet_config::{Config, config_path, load_config_or_default, save_config};

/// Everything needed to open one gateway session.
#[derive(Debug)]
pub struct Connection {
    pub profile_name: String,
    pub gateway: GatewayConfig,
    pub mqtt: MqttSettings,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Comma-separated profile names, sorted.
pub fn profile_names(config: &Config) -> String {
    let mut names: Vec<&str> = config.profiles.keys().map(String::as_str).collect();
    names.sort_unstable();
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}

/// Translate the active profile + global flags into session settings.
///
/// Flags take priority over profile values. Without a profile, `--host`
/// and `--gateway` alone are enough.
pub fn resolve_connection(global: &GlobalOpts, config: &Config) -> Result<Connection, CliError> {
    let profile_name = active_profile_name(global, config);

    let mut profile = match config.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: profile_names(config),
            });
        }
        None => match (&global.host, &global.gateway) {
            (Some(host), Some(gateway)) => Profile::new(host, gateway),
            _ => {
                return Err(CliError::NoConfig {
                    path: config_path().display().to_string(),
                });
            }
        },
    };

    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(port) = global.port {
        profile.port = port;
    }
    if let Some(ref gateway) = global.gateway {
        profile.gateway_id.clone_from(gateway);
    }

    let mut gateway = greennet_config::profile_to_gateway_config(&profile, &config.defaults)?;
    if let Some(timeout) = global.timeout {
        gateway.command_timeout = timeout;
    }
    let mqtt = greennet_config::profile_to_mqtt_settings(&profile, &profile_name)?;

    Ok(Connection {
        profile_name,
        gateway,
        mqtt,
    })
}
