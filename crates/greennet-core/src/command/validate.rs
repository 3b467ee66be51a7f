// ── Outbound validation ──
//
// The whole function list is checked before anything is published; a
// single bad pair rejects the command.

use std::collections::HashSet;

use greennet_api::Function;

use crate::error::CommandError;
use crate::model::Device;
use crate::profile::{self, CommandClass};

/// A function list ready to publish.
#[derive(Debug)]
pub(super) struct Checked {
    /// Values normalized to text, original order kept.
    pub functions: Vec<Function>,
    pub class: CommandClass,
    pub channel: u8,
}

pub(super) fn check(device: &Device, functions: &[Function]) -> Result<Checked, CommandError> {
    if !device.profile_resolved {
        return Err(CommandError::ProfileUnresolved {
            device: device.id.clone(),
        });
    }
    let Some(profile) = profile::lookup(device.profile) else {
        return Err(CommandError::invalid(
            "",
            format!("profile {} accepts no commands", device.profile),
        ));
    };
    if functions.is_empty() {
        return Err(CommandError::invalid("", "empty function list"));
    }

    let mut seen = HashSet::new();
    let mut class = None;
    let mut channel = 0;
    let mut normalized = Vec::with_capacity(functions.len());

    for function in functions {
        let key = function.key.as_str();
        if !seen.insert(key) {
            return Err(CommandError::invalid(key, "duplicate key"));
        }
        let spec = profile.outbound_key(key).ok_or_else(|| {
            CommandError::invalid(key, format!("not accepted by {}", profile.name))
        })?;
        spec.validate(&function.value)
            .map_err(|reason| CommandError::invalid(key, reason))?;

        if spec.is_routing() {
            channel = function
                .value_text()
                .trim()
                .parse::<u8>()
                .map_err(|_| CommandError::invalid(key, "channel must be an integer"))?;
            if channel >= device.channel_count() {
                return Err(CommandError::invalid(
                    key,
                    format!(
                        "channel {channel} out of range, device has {}",
                        device.channel_count()
                    ),
                ));
            }
        } else if class.is_none() {
            class = spec.class;
        }

        if key == "angle" && !device.tilt {
            return Err(CommandError::invalid(key, "cover has no tilt"));
        }
        normalized.push(Function::text(key, function.value_text()));
    }

    let class = class.ok_or_else(|| CommandError::invalid("channel", "no actuator function"))?;
    Ok(Checked {
        functions: normalized,
        class,
        channel,
    })
}
