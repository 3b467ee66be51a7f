//! Config subcommand handlers.

use dialoguer::{Input, Password, Select};
use serde::Serialize;
use tabled::Tabled;

use greennet_api::mqtt::DEFAULT_PORT;
use greennet_config::Profile;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking the plaintext password.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = \"{}\"", cfg.defaults.timeout);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "host = \"{}\"", p.host);
        let _ = writeln!(out, "port = {}", p.port);
        let _ = writeln!(out, "gateway_id = \"{}\"", p.gateway_id);
        let optional = [
            ("client_id", &p.client_id),
            ("username", &p.username),
            ("password_env", &p.password_env),
            ("topic_base", &p.topic_base),
            ("command_timeout", &p.command_timeout),
            ("bootstrap_timeout", &p.bootstrap_timeout),
        ];
        for (key, value) in optional
            .iter()
            .filter_map(|(key, value)| value.as_ref().map(|v| (key, v)))
        {
            let _ = writeln!(out, "{key} = \"{value}\"");
        }
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
    }

    out
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Offer to store the password in the system keyring or return it for plaintext config.
///
/// Returns `Some(password)` if the user chose plaintext, `None` if stored in keyring.
fn prompt_password_storage(profile_name: &str, password: &str) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the password?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        greennet_config::store_password(profile_name, password)?;
        eprintln!("   ✓ password stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(password.to_owned()))
    }
}

#[derive(Clone, Serialize, Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    active: &'static str,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Broker")]
    broker: String,
    #[tabled(rename = "Gateway")]
    gateway: String,
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(),

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            output::print_output(&format_config_redacted(&cfg), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let active = config::active_profile_name(global, &cfg);
            let mut rows: Vec<ProfileRow> = cfg
                .profiles
                .iter()
                .map(|(name, p)| ProfileRow {
                    active: if *name == active { "*" } else { "" },
                    name: name.clone(),
                    broker: format!("{}:{}", p.host, p.port),
                    gateway: p.gateway_id.clone(),
                })
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));

            let out = output::render_list(
                &global.output,
                &rows,
                ProfileRow::clone,
                |r| r.name.clone(),
                "No profiles configured; run `greennet config init`",
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::profile_names(&cfg),
                    name,
                });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Default profile set to '{name}'");
            }
            Ok(())
        }

        ConfigCommand::SetPassword => {
            let cfg = config::load_config_or_default();
            let name = config::active_profile_name(global, &cfg);
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::profile_names(&cfg),
                    name,
                });
            }
            let password = Password::new()
                .with_prompt(format!("Broker password for '{name}'"))
                .interact()
                .map_err(prompt_err)?;
            greennet_config::store_password(&name, &password)?;
            if !global.quiet {
                eprintln!("Password for '{name}' stored in system keyring");
            }
            Ok(())
        }
    }
}

/// Interactive wizard creating or replacing one profile.
fn init() -> Result<(), CliError> {
    let config_path = config::config_path();
    eprintln!("greennet configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default("default".into())
        .interact_text()
        .map_err(prompt_err)?;

    let host: String = Input::new()
        .with_prompt("MQTT broker host")
        .interact_text()
        .map_err(prompt_err)?;

    let port: u16 = Input::new()
        .with_prompt("MQTT broker port")
        .default(DEFAULT_PORT)
        .interact_text()
        .map_err(prompt_err)?;

    let gateway_id: String = Input::new()
        .with_prompt("Gateway ID")
        .interact_text()
        .map_err(prompt_err)?;

    let username: String = Input::new()
        .with_prompt("Broker username (empty for anonymous)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;

    let mut profile = Profile::new(host, gateway_id);
    profile.port = port;
    if !username.is_empty() {
        let password = Password::new()
            .with_prompt("Broker password")
            .interact()
            .map_err(prompt_err)?;
        profile.username = Some(username);
        profile.password = prompt_password_storage(&profile_name, &password)?;
    }

    let mut cfg = config::load_config_or_default();
    if cfg.profiles.is_empty() {
        cfg.default_profile = Some(profile_name.clone());
    }
    cfg.profiles.insert(profile_name.clone(), profile);
    config::save_config(&cfg)?;

    eprintln!("\n   ✓ profile '{profile_name}' saved to {}", config_path.display());
    Ok(())
}
