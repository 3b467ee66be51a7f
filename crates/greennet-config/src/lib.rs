//! Gateway profiles for the greennet CLI.
//!
//! TOML profiles, password resolution (env + keyring + plaintext), and
//! translation into [`GatewayConfig`] and [`MqttSettings`]. The CLI adds
//! flag-aware overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use greennet_api::mqtt::{DEFAULT_PORT, MqttSettings};
use greennet_core::GatewayConfig;

const KEYRING_SERVICE: &str = "greennet";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("no password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

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
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named gateway profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name, falling back to `default_profile`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into());
        let profile = self
            .profiles
            .get(&name)
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.clone() })?;
        Ok((name, profile))
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Answer timeout used when a profile sets none, e.g. `"10s"`.
    #[serde(default = "default_timeout")]
    pub timeout: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> String {
    "10s".into()
}

/// A named gateway profile.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Profile {
    /// Broker host name or address.
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Gateway identifier, the topic segment after the base.
    pub gateway_id: String,

    /// MQTT client id. Random when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Broker password (plaintext, prefer keyring).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable holding the broker password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// Topic base override (default `EnOcean`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_base: Option<String>,

    /// e.g. `"5s"`, `"1m"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_timeout: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_timeout: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Profile {
    pub fn new(host: impl Into<String>, gateway_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            gateway_id: gateway_id.into(),
            client_id: None,
            username: None,
            password: None,
            password_env: None,
            topic_base: None,
            command_timeout: None,
            bootstrap_timeout: None,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "greennet", "greennet").map_or_else(
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
    p.push("greennet");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path` + environment.
///
/// `GREENNET_` variables override file values; nested keys use `__`,
/// e.g. `GREENNET_PROFILES__HOME__HOST`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("GREENNET_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file is missing or broken.
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
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the broker password for a profile.
///
/// Anonymous profiles (no `username`) resolve to `None`. Otherwise the
/// chain is: `password_env` / `GREENNET_PASSWORD` → keyring → plaintext.
pub fn resolve_password(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<SecretString>, ConfigError> {
    if profile.username.is_none() {
        return Ok(None);
    }

    // 1. Env var
    let env_name = profile.password_env.as_deref().unwrap_or("GREENNET_PASSWORD");
    if let Ok(pw) = std::env::var(env_name) {
        return Ok(Some(SecretString::from(pw)));
    }

    // 2. Keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name)) {
        if let Ok(pw) = entry.get_password() {
            return Ok(Some(SecretString::from(pw)));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(Some(SecretString::from(pw.clone())));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a profile's broker password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))?;
    entry.set_password(password)?;
    Ok(())
}

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/password")
}

// ── Translation ─────────────────────────────────────────────────────

/// Parse a human duration such as `"10s"` or `"1m 30s"`.
pub fn parse_duration(field: &str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("'{raw}': {e}"),
    })
}

/// Build the engine configuration for a profile.
pub fn profile_to_gateway_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<GatewayConfig, ConfigError> {
    if profile.gateway_id.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "gateway_id".into(),
            reason: "must not be empty".into(),
        });
    }
    if profile.gateway_id.contains('/') {
        return Err(ConfigError::Validation {
            field: "gateway_id".into(),
            reason: "must be a single topic segment".into(),
        });
    }

    let mut config = GatewayConfig::new(profile.gateway_id.trim());
    if let Some(ref base) = profile.topic_base {
        config.topic_base.clone_from(base);
    }
    let timeout = profile.command_timeout.as_deref().unwrap_or(&defaults.timeout);
    config.command_timeout = parse_duration("command_timeout", timeout)?;
    if let Some(ref raw) = profile.bootstrap_timeout {
        config.bootstrap_timeout = parse_duration("bootstrap_timeout", raw)?;
    }
    Ok(config)
}

/// Build broker connection settings for a profile, resolving its password.
pub fn profile_to_mqtt_settings(
    profile: &Profile,
    profile_name: &str,
) -> Result<MqttSettings, ConfigError> {
    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }

    let mut settings = MqttSettings::new(profile.host.trim(), profile.port);
    if let Some(ref client_id) = profile.client_id {
        settings = settings.with_client_id(client_id);
    }
    if let (Some(user), Some(password)) = (&profile.username, resolve_password(profile, profile_name)?) {
        settings = settings.with_credentials(user, password);
    }
    Ok(settings)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn gateway_config_takes_profile_overrides() {
        let mut profile = Profile::new("broker.local", "GW01");
        profile.topic_base = Some("Site".into());
        profile.command_timeout = Some("2s 500ms".into());
        profile.bootstrap_timeout = Some("1m".into());

        let config = profile_to_gateway_config(&profile, &Defaults::default()).unwrap();
        assert_eq!(config.gateway_id, "GW01");
        assert_eq!(config.topic_base, "Site");
        assert_eq!(config.command_timeout, Duration::from_millis(2500));
        assert_eq!(config.bootstrap_timeout, Duration::from_secs(60));
    }

    #[test]
    fn gateway_config_falls_back_to_defaults() {
        let profile = Profile::new("broker.local", "GW01");
        let config = profile_to_gateway_config(&profile, &Defaults::default()).unwrap();
        assert_eq!(config, GatewayConfig::new("GW01"));
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut profile = Profile::new("broker.local", "GW/01");
        assert!(matches!(
            profile_to_gateway_config(&profile, &Defaults::default()),
            Err(ConfigError::Validation { ref field, .. }) if field == "gateway_id"
        ));

        profile.gateway_id = "GW01".into();
        profile.command_timeout = Some("soon".into());
        assert!(matches!(
            profile_to_gateway_config(&profile, &Defaults::default()),
            Err(ConfigError::Validation { ref field, .. }) if field == "command_timeout"
        ));
    }

    #[test]
    fn anonymous_profile_needs_no_password() {
        let profile = Profile::new("broker.local", "GW01");
        assert!(resolve_password(&profile, "anon").unwrap().is_none());

        let settings = profile_to_mqtt_settings(&profile, "anon").unwrap();
        assert_eq!(settings.host, "broker.local");
        assert_eq!(settings.port, DEFAULT_PORT);
        assert!(settings.username.is_none());
    }

    #[test]
    fn plaintext_password_is_last_resort() {
        let mut profile = Profile::new("broker.local", "GW01");
        profile.username = Some("mqtt".into());
        profile.password = Some("hunter2".into());
        profile.password_env = Some("GREENNET_TEST_UNSET_PASSWORD_VAR".into());
        profile.client_id = Some("greennet-test".into());

        let settings = profile_to_mqtt_settings(&profile, "greennet-test-plaintext").unwrap();
        assert_eq!(settings.username.as_deref(), Some("mqtt"));
        assert_eq!(settings.password.unwrap().expose_secret(), "hunter2");
        assert_eq!(settings.client_id.as_deref(), Some("greennet-test"));
    }

    #[test]
    fn profile_lookup_uses_default_name() {
        let mut config = Config::default();
        config
            .profiles
            .insert("default".into(), Profile::new("a", "GW01"));
        config.profiles.insert("lab".into(), Profile::new("b", "GW02"));

        assert_eq!(config.profile(None).unwrap().1.host, "a");
        assert_eq!(config.profile(Some("lab")).unwrap().0, "lab");
        assert!(matches!(
            config.profile(Some("missing")),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }
}
