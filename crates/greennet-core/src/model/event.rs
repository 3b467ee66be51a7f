// ── Model and sync events ──
//
// Broadcast to every subscriber of `Gateway::events()`. Attribute events
// fire only for actual value changes; same-value refreshes are silent.

use serde::Serialize;

use super::device_id::DeviceId;
use super::value::{AttributeValue, Severity};
use crate::profile::ProfileId;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Event {
    DeviceAdded {
        device: DeviceId,
        profile: ProfileId,
    },
    DeviceRemoved {
        device: DeviceId,
    },
    /// Declared profile differs from the previous one; stored values were cleared.
    ProfileReassigned {
        device: DeviceId,
        previous: ProfileId,
        profile: ProfileId,
    },
    /// Device referenced before its profile is known.
    ProfileUnresolved {
        device: DeviceId,
    },
    AttributeChanged {
        device: DeviceId,
        channel: u8,
        key: String,
        previous: Option<AttributeValue>,
        value: AttributeValue,
    },
    ConditionRaised {
        device: DeviceId,
        channel: u8,
        key: String,
        severity: Severity,
        previous: Option<Severity>,
    },
    ConditionCleared {
        device: DeviceId,
        channel: u8,
        key: String,
        previous: Severity,
    },
    /// An inbound value outside the profile grammar; the old value was kept.
    UpdateRejected {
        device: DeviceId,
        channel: u8,
        key: String,
        reason: String,
    },
    BootstrapCompleted {
        devices: usize,
    },
    BootstrapFailed {
        reason: String,
    },
}

impl Event {
    /// Device the event concerns, if any.
    pub fn device(&self) -> Option<&DeviceId> {
        match self {
            Self::DeviceAdded { device, .. }
            | Self::DeviceRemoved { device }
            | Self::ProfileReassigned { device, .. }
            | Self::ProfileUnresolved { device }
            | Self::AttributeChanged { device, .. }
            | Self::ConditionRaised { device, .. }
            | Self::ConditionCleared { device, .. }
            | Self::UpdateRejected { device, .. } => Some(device),
            Self::BootstrapCompleted { .. } | Self::BootstrapFailed { .. } => None,
        }
    }
}
