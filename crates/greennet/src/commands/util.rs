//! Shared helpers for command handlers.

use std::path::Path;
use std::time::Duration;

use greennet_core::{DeviceId, Gateway, RequestOutcome};
use serde_json::Value;

use crate::error::CliError;

/// Resolve a device identifier (radio ID or friendly ID) via snapshot lookup.
pub fn resolve_device_id(gateway: &Gateway, identifier: &str) -> Result<DeviceId, CliError> {
    let snap = gateway.devices_snapshot();
    snap.iter()
        .find(|d| {
            d.id.as_str().eq_ignore_ascii_case(identifier)
                || d.friendly_id.as_deref() == Some(identifier)
        })
        .map(|d| d.id.clone())
        .ok_or_else(|| CliError::NotFound {
            resource_type: "device".into(),
            identifier: identifier.into(),
            list_command: "devices list".into(),
        })
}

/// Read and parse a JSON file for `--from-file` flags.
pub fn read_json_file(path: &Path) -> Result<Value, CliError> {
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents).map_err(|e| CliError::Validation {
        field: "from-file".into(),
        reason: format!("invalid JSON: {e}"),
    })
}

/// Unwrap a ReCom answer body, turning every other outcome into an error.
pub fn answer_data(outcome: RequestOutcome, timeout: Duration) -> Result<Value, CliError> {
    match outcome {
        RequestOutcome::Answered(answer) if answer.is_success() => Ok(answer.data),
        RequestOutcome::Answered(answer) => Err(CliError::CommandFailed {
            status: answer.status,
            detail: answer.detail,
        }),
        RequestOutcome::TimedOut => Err(CliError::Timeout {
            seconds: timeout.as_secs(),
        }),
        RequestOutcome::ConnectionLost => Err(CliError::ConnectionLost),
        other => Err(CliError::Aborted {
            outcome: format!("{other:?}"),
        }),
    }
}
