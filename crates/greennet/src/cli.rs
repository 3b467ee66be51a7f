//! Clap derive structures for the `greennet` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use strum::IntoEnumIterator;

use greennet_core::ProfileId;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// greennet -- command-line client for EnOcean-over-IP gateways
#[derive(Debug, Parser)]
#[command(
    name = "greennet",
    version,
    about = "Monitor and control EnOcean devices through an MQTT gateway",
    long_about = "Synchronizes the device set of an EnOcean-over-IP gateway over MQTT,\n\
        shows live device state and sends validated commands.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Gateway profile to use
    #[arg(long, short = 'p', env = "GREENNET_PROFILE", global = true)]
    pub profile: Option<String>,

    /// MQTT broker host (overrides profile)
    #[arg(long, env = "GREENNET_HOST", global = true)]
    pub host: Option<String>,

    /// MQTT broker port (overrides profile)
    #[arg(long, env = "GREENNET_PORT", global = true)]
    pub port: Option<u16>,

    /// Gateway identifier (overrides profile)
    #[arg(long, short = 'g', env = "GREENNET_GATEWAY", global = true)]
    pub gateway: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "GREENNET_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Answer timeout, e.g. "5s" or "1m"
    #[arg(long, env = "GREENNET_TIMEOUT", value_parser = humantime::parse_duration, global = true)]
    pub timeout: Option<Duration>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect synchronized devices
    #[command(alias = "dev", alias = "d")]
    Devices(DevicesArgs),

    /// Stream device model events until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Send a command to a device
    Send(SendArgs),

    /// Remote commissioning requests
    Recom(RecomArgs),

    /// Gateway system information
    #[command(alias = "sys")]
    System(SystemArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DEVICES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DevicesArgs {
    #[command(subcommand)]
    pub command: DevicesCommand,
}

#[derive(Debug, Subcommand)]
pub enum DevicesCommand {
    /// List known devices
    #[command(alias = "ls")]
    List {
        /// Only devices of this profile
        #[arg(long, value_parser = parse_profile)]
        profile_filter: Option<ProfileId>,

        /// Only devices whose profile is not known yet
        #[arg(long, conflicts_with = "profile_filter")]
        unresolved: bool,

        /// Only devices with active error or warning conditions
        #[arg(long)]
        conditions: bool,
    },

    /// Show one device with all channel attributes
    Show {
        /// Device ID or friendly ID
        device: String,
    },
}

/// Parse a profile name case-insensitively.
fn parse_profile(raw: &str) -> Result<ProfileId, String> {
    ProfileId::iter()
        .find(|p| p.to_string().eq_ignore_ascii_case(raw))
        .ok_or_else(|| {
            let names: Vec<String> = ProfileId::iter().map(|p| p.to_string()).collect();
            format!("unknown profile '{raw}' (expected one of: {})", names.join(", "))
        })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only events of this device
    #[arg(long, short = 'd')]
    pub device: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SEND
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Device ID or friendly ID
    pub device: String,

    /// Return once published instead of waiting for the answer
    #[arg(long)]
    pub no_wait: bool,

    #[command(subcommand)]
    pub action: SendAction,
}

#[derive(Debug, Subcommand)]
pub enum SendAction {
    /// Switch on
    On {
        #[arg(long, short = 'c', default_value = "0")]
        channel: u8,
    },

    /// Switch off
    Off {
        #[arg(long, short = 'c', default_value = "0")]
        channel: u8,
    },

    /// Dim to a brightness level
    Dim {
        /// Brightness in percent (0-100)
        level: u8,
    },

    /// Move a cover to a position
    Position {
        /// Position in percent (0 = open, 100 = closed)
        percent: u8,
    },

    /// Set the slat angle of a cover
    Tilt {
        /// Angle in percent
        angle: u8,
    },

    /// Stop a moving cover
    Stop,

    /// Set the target temperature of a heating actuator
    Setpoint {
        /// Temperature in °C
        celsius: f64,
    },

    /// Set a heating operating mode
    Mode {
        #[arg(value_enum)]
        kind: ModeKind,
        /// Mode value as reported by the device
        value: String,
    },

    /// Ask the device to report its status
    Query,

    /// Send raw functions
    Raw {
        /// Functions as key=value pairs, in order
        #[arg(required = true, value_parser = parse_function)]
        functions: Vec<(String, String)>,
    },
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ModeKind {
    Heater,
    Thermal,
}

fn parse_function(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected key=value, got '{raw}'")),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  RECOM
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct RecomArgs {
    #[command(subcommand)]
    pub command: RecomCommand,
}

#[derive(Debug, Subcommand)]
pub enum RecomCommand {
    /// Read a device's configuration
    Config { device: String },

    /// Read a device's parameters
    Params { device: String },

    /// Read a device's link tables
    LinkTables { device: String },

    /// Write a device's configuration from a JSON file
    SetConfig {
        device: String,

        /// JSON body to send
        #[arg(long, short = 'F')]
        from_file: PathBuf,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SYSTEM
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SystemArgs {
    #[command(subcommand)]
    pub command: SystemCommand,
}

#[derive(Debug, Subcommand)]
pub enum SystemCommand {
    /// Gateway hardware and firmware information
    Info,

    /// Gateway uptime
    Uptime,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (secrets masked)
    Show,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store the broker password of the active profile in the system keyring
    SetPassword,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn profile_names_ignore_case() {
        assert_eq!(parse_profile("dimmer"), Ok(ProfileId::Dimmer));
        assert!(parse_profile("toaster").is_err());
    }

    #[test]
    fn raw_functions_need_a_key() {
        assert_eq!(
            parse_function("dimValue=40"),
            Ok(("dimValue".to_owned(), "40".to_owned()))
        );
        assert!(parse_function("=40").is_err());
        assert!(parse_function("dimValue").is_err());
    }
}
