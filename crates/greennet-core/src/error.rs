// ── Core error types ──
//
// `CoreError` is what consumers of the `Gateway` see for lifecycle and
// request failures. `CommandError` covers synchronous dispatch failures,
// raised before anything is published. `Rejected` explains why the device
// model refused an inbound update.

use thiserror::Error;

use crate::model::DeviceId;

/// Lifecycle errors of the `Gateway`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Gateway is shutting down")]
    ShuttingDown,
}

// ── Command errors ───────────────────────────────────────────────────

/// Reasons a command or request was refused before publishing.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Invalid command: '{key}' {reason}")]
    InvalidCommand { key: String, reason: String },

    #[error("Unknown device: {device}")]
    UnknownDevice { device: DeviceId },

    #[error("Profile of device {device} is not resolved yet")]
    ProfileUnresolved { device: DeviceId },

    #[error("Gateway is not connected")]
    NotConnected,

    #[error("Publish failed: {0}")]
    Publish(#[from] greennet_api::Error),
}

impl CommandError {
    pub(crate) fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCommand {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

// ── Update rejections ────────────────────────────────────────────────

/// Why `DeviceModel::apply_update` left state untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("unknown device {0}")]
    UnknownDevice(DeviceId),

    #[error("channel {channel} out of range (device has {count})")]
    InvalidChannel { channel: u8, count: u8 },

    #[error("key '{0}' is not reported by this profile")]
    UnknownKey(String),

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}
