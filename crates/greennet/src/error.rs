//! CLI error types with miette diagnostics.
//!
//! Maps core, command and config errors into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use greennet_config::ConfigError;
use greennet_core::{CommandError, CoreError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const REJECTED: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach gateway '{gateway}' via {broker}")]
    #[diagnostic(
        code(greennet::connection_failed),
        help(
            "Check that the broker is running and the gateway publishes under this id.\n\
             Try: greennet -v system info"
        )
    )]
    ConnectionFailed { gateway: String, broker: String },

    #[error("Gateway connection was lost")]
    #[diagnostic(code(greennet::connection_lost))]
    ConnectionLost,

    // ── Authentication ───────────────────────────────────────────────

    #[error("No broker password configured for profile '{profile}'")]
    #[diagnostic(
        code(greennet::no_credentials),
        help(
            "Store one with: greennet config set-password --profile {profile}\n\
             Or set GREENNET_PASSWORD."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(greennet::not_found),
        help("Run: greennet {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── Commands ─────────────────────────────────────────────────────

    #[error("Command rejected: {reason}")]
    #[diagnostic(code(greennet::rejected))]
    Rejected { reason: String },

    #[error("Gateway answered {status}{}", detail.as_ref().map(|d| format!(": {d}")).unwrap_or_default())]
    #[diagnostic(code(greennet::command_failed))]
    CommandFailed { status: u16, detail: Option<String> },

    #[error("Command did not complete: {outcome}")]
    #[diagnostic(code(greennet::aborted))]
    Aborted { outcome: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(greennet::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(greennet::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: greennet config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No gateway configured")]
    #[diagnostic(
        code(greennet::no_config),
        help(
            "Create a profile with: greennet config init\n\
             Or pass --host and --gateway.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(greennet::config))]
    Config(Box<ConfigError>),

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("No answer after {seconds}s")]
    #[diagnostic(
        code(greennet::timeout),
        help("Increase the timeout with --timeout or check that the device is in range.")
    )]
    Timeout { seconds: u64 },

    // ── Internal ─────────────────────────────────────────────────────

    #[error("Gateway error: {message}")]
    #[diagnostic(code(greennet::gateway))]
    Gateway { message: String },

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(greennet::json), help("Check the JSON contents and try again."))]
    Json(#[from] serde_json::Error),

    #[error("YAML rendering failed: {0}")]
    #[diagnostic(code(greennet::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::ConnectionLost => exit_code::CONNECTION,
            Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Rejected { .. } | Self::CommandFailed { .. } => exit_code::REJECTED,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Error mapping ────────────────────────────────────────────────────

impl From<CommandError> for CliError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::UnknownDevice { device } => CliError::NotFound {
                resource_type: "device".into(),
                identifier: device.to_string(),
                list_command: "devices list".into(),
            },
            CommandError::NotConnected => CliError::ConnectionLost,
            err @ (CommandError::InvalidCommand { .. } | CommandError::ProfileUnresolved { .. }) => {
                CliError::Rejected {
                    reason: err.to_string(),
                }
            }
            CommandError::Publish(e) => CliError::Gateway {
                message: e.to_string(),
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Command(e) => e.into(),
            shutting @ CoreError::ShuttingDown => CliError::Gateway {
                message: shutting.to_string(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use greennet_core::DeviceId;

    use super::*;

    #[test]
    fn command_errors_map_to_exit_codes() {
        let unknown: CliError = CommandError::UnknownDevice {
            device: DeviceId::new("0528C9BA"),
        }
        .into();
        assert_eq!(unknown.exit_code(), exit_code::NOT_FOUND);

        let offline: CliError = CoreError::Command(CommandError::NotConnected).into();
        assert_eq!(offline.exit_code(), exit_code::CONNECTION);

        let stopping: CliError = CoreError::ShuttingDown.into();
        assert_eq!(stopping.to_string(), "Gateway error: Gateway is shutting down");
        assert_eq!(stopping.exit_code(), exit_code::GENERAL);

        let failed = CliError::CommandFailed {
            status: 400,
            detail: Some("bad value".into()),
        };
        assert_eq!(failed.to_string(), "Gateway answered 400: bad value");
        assert_eq!(failed.exit_code(), exit_code::REJECTED);
    }
}
