// ── Inbound update validation and merge ──
//
// Validation runs against a shared `&Device` first so rejected updates
// never touch stored state. Only a validated update is merged.

use std::mem;

use chrono::{DateTime, Utc};
use serde_json::Value;

use greennet_api::payload::NOT_AVAILABLE;

use crate::error::Rejected;
use crate::model::{Attribute, AttributeValue, Condition, Device, DeviceId, Event, Severity};
use crate::profile::{self, grammar::number_of};

/// Upper bound on channels grown for devices without a profile.
const MAX_CHANNELS: u8 = 8;

/// A successfully applied update.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedChange {
    pub device: DeviceId,
    pub channel: u8,
    pub key: String,
    pub change: Change,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Same value as before; only the timestamp moved.
    Refreshed,
    Value {
        previous: Option<AttributeValue>,
        value: AttributeValue,
    },
    ConditionRaised {
        previous: Option<Severity>,
        severity: Severity,
    },
    ConditionCleared {
        previous: Severity,
    },
}

impl AppliedChange {
    /// `false` for timestamp-only refreshes.
    pub fn is_change(&self) -> bool {
        !matches!(self.change, Change::Refreshed)
    }

    pub(crate) fn to_event(&self) -> Option<Event> {
        let device = self.device.clone();
        let channel = self.channel;
        let key = self.key.clone();
        match &self.change {
            Change::Refreshed => None,
            Change::Value { previous, value } => Some(Event::AttributeChanged {
                device,
                channel,
                key,
                previous: previous.clone(),
                value: value.clone(),
            }),
            Change::ConditionRaised { previous, severity } => Some(Event::ConditionRaised {
                device,
                channel,
                key,
                severity: *severity,
                previous: *previous,
            }),
            Change::ConditionCleared { previous } => Some(Event::ConditionCleared {
                device,
                channel,
                key,
                previous: *previous,
            }),
        }
    }
}

/// A validated update ready to merge.
#[derive(Debug)]
pub(super) enum Validated {
    State(AttributeValue),
    /// `None` is `reset`.
    Condition(Option<Severity>),
}

/// Check `raw` against the device's profile without mutating anything.
///
/// Devices without a catalog profile accept any scalar best-effort and
/// grow channels on demand.
pub(super) fn validate(
    device: &Device,
    channel: u8,
    key: &str,
    raw: &Value,
) -> Result<Validated, Rejected> {
    let Some(profile) = profile::lookup(device.profile) else {
        if channel >= MAX_CHANNELS {
            return Err(Rejected::InvalidChannel {
                channel,
                count: MAX_CHANNELS,
            });
        }
        return best_effort(raw)
            .map(Validated::State)
            .ok_or_else(|| Rejected::InvalidValue {
                key: key.to_owned(),
                reason: format!("unsupported value {raw}"),
            });
    };

    if channel >= device.channel_count() {
        return Err(Rejected::InvalidChannel {
            channel,
            count: device.channel_count(),
        });
    }

    let spec = profile
        .inbound_key(key)
        .filter(|spec| !spec.is_routing())
        .filter(|spec| spec.key != "angle" || device.tilt)
        .ok_or_else(|| Rejected::UnknownKey(key.to_owned()))?;

    let value = spec.validate(raw).map_err(|reason| Rejected::InvalidValue {
        key: key.to_owned(),
        reason,
    })?;

    if !spec.is_condition() {
        return Ok(Validated::State(value));
    }
    match value.as_str() {
        Some("reset") => Ok(Validated::Condition(None)),
        Some(word) => word
            .parse::<Severity>()
            .map(|s| Validated::Condition(Some(s)))
            .map_err(|_| Rejected::InvalidValue {
                key: key.to_owned(),
                reason: format!("'{word}' is not a severity"),
            }),
        None => Err(Rejected::InvalidValue {
            key: key.to_owned(),
            reason: format!("expected a severity, got {value}"),
        }),
    }
}

/// Merge a validated update. Conditions never stack per key.
pub(super) fn merge(
    device: &mut Device,
    channel: u8,
    key: &str,
    update: Validated,
    now: DateTime<Utc>,
) -> Change {
    if usize::from(channel) >= device.channels.len() {
        device.resize_channels(channel.saturating_add(1));
    }
    device.last_seen = Some(now);
    let Some(ch) = device.channels.get_mut(usize::from(channel)) else {
        return Change::Refreshed;
    };

    match update {
        Validated::State(value) => match ch.attributes.get_mut(key) {
            Some(attr) if attr.value == value => {
                attr.updated_at = now;
                Change::Refreshed
            }
            Some(attr) => {
                let previous = mem::replace(&mut attr.value, value.clone());
                attr.updated_at = now;
                Change::Value {
                    previous: Some(previous),
                    value,
                }
            }
            None => {
                ch.attributes.insert(
                    key.to_owned(),
                    Attribute {
                        value: value.clone(),
                        updated_at: now,
                    },
                );
                Change::Value {
                    previous: None,
                    value,
                }
            }
        },
        Validated::Condition(None) => match ch.conditions.remove(key) {
            Some(cleared) => Change::ConditionCleared {
                previous: cleared.severity,
            },
            None => Change::Refreshed,
        },
        Validated::Condition(Some(severity)) => match ch.conditions.get_mut(key) {
            Some(active) if active.severity == severity => {
                active.updated_at = now;
                Change::Refreshed
            }
            Some(active) => {
                let previous = active.severity;
                *active = Condition {
                    severity,
                    since: now,
                    updated_at: now,
                };
                Change::ConditionRaised {
                    previous: Some(previous),
                    severity,
                }
            }
            None => {
                ch.conditions.insert(
                    key.to_owned(),
                    Condition {
                        severity,
                        since: now,
                        updated_at: now,
                    },
                );
                Change::ConditionRaised {
                    previous: None,
                    severity,
                }
            }
        },
    }
}

fn best_effort(raw: &Value) -> Option<AttributeValue> {
    match raw {
        Value::Bool(b) => Some(AttributeValue::Flag(*b)),
        Value::Number(_) => number_of(raw).map(|value| AttributeValue::Number { value, unit: None }),
        Value::String(s) if s == NOT_AVAILABLE => Some(AttributeValue::NotAvailable),
        Value::String(s) => Some(AttributeValue::Choice(s.clone())),
        _ => None,
    }
}
