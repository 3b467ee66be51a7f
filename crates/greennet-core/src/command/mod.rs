// ── Command API ──
//
// Device commands are ordered function lists published on
// `put/devices/<id>/state`. Typed `Command` builders produce those lists
// per profile; `Raw` passes a list through unchanged. Every command is
// validated against the profile's outbound grammar before publishing.

mod dispatcher;
mod pending;
pub mod requests;
mod validate;

use serde::Serialize;
use serde_json::Value;

use greennet_api::{Answer, Function};

use crate::profile::ProfileId;

pub(crate) use dispatcher::Dispatcher;
pub use pending::{PendingCommand, PendingRequest};
pub(crate) use pending::{Delivery, PendingTable, Resolution};
pub use requests::Request;

/// High-level device commands.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Switch on, or dim to `brightness` percent (100 when unset) on dimmers.
    TurnOn {
        channel: u8,
        brightness: Option<u8>,
    },
    TurnOff {
        channel: u8,
    },
    SetCoverPosition {
        position: u8,
    },
    SetCoverTilt {
        angle: u8,
    },
    StopCover,
    SetSetpoint {
        temperature: f64,
    },
    SetHeaterMode {
        mode: String,
    },
    SetThermalMode {
        mode: String,
    },
    QueryStatus,
    Raw(Vec<Function>),
}

impl Command {
    /// Function list for a device of `profile`.
    ///
    /// Values are text. Channel 0 is implied; other channels append a
    /// trailing `channel` function.
    pub fn functions(&self, profile: ProfileId) -> Vec<Function> {
        let dimmer = profile == ProfileId::Dimmer;
        let mut functions = match self {
            Self::TurnOn { brightness, .. } if dimmer => {
                vec![Function::text("dimValue", brightness.unwrap_or(100))]
            }
            Self::TurnOn { .. } => vec![Function::text("switch", "on")],
            Self::TurnOff { .. } if dimmer => vec![Function::text("dimValue", 0)],
            Self::TurnOff { .. } => vec![Function::text("switch", "off")],
            Self::SetCoverPosition { position } => vec![Function::text("position", position)],
            Self::SetCoverTilt { angle } => vec![Function::text("angle", angle)],
            Self::StopCover => vec![Function::text("position", "stop")],
            Self::SetSetpoint { temperature } => {
                vec![Function::text("temperatureSetpoint", temperature)]
            }
            Self::SetHeaterMode { mode } => vec![Function::text("heaterMode", mode)],
            Self::SetThermalMode { mode } => vec![Function::text("thermalMode", mode)],
            Self::QueryStatus => vec![Function::text("query", "status")],
            Self::Raw(functions) => return functions.clone(),
        };

        if let Some(channel) = self.channel().filter(|c| *c > 0) {
            functions.push(Function::text("channel", channel));
        }
        functions
    }

    pub fn channel(&self) -> Option<u8> {
        match self {
            Self::TurnOn { channel, .. } | Self::TurnOff { channel } => Some(*channel),
            _ => None,
        }
    }
}

// ── Outcomes ─────────────────────────────────────────────────────────

/// Final state of a published command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    /// Answered `200`, with any echoed data.
    Success { data: Value },
    /// Answered `201`; the device confirms later through a telegram.
    AcceptedPendingAck,
    Failed {
        status: u16,
        detail: Option<String>,
    },
    /// A newer command of the same class replaced this one.
    Superseded,
    TimedOut,
    Cancelled,
    ConnectionLost,
    DeviceRemoved,
}

impl CommandOutcome {
    pub fn from_answer(answer: Answer) -> Self {
        match answer.status {
            200 => Self::Success { data: answer.data },
            201 => Self::AcceptedPendingAck,
            status => Self::Failed {
                status,
                detail: answer.detail,
            },
        }
    }

    pub(crate) fn from_resolution(resolution: Resolution) -> Self {
        match resolution {
            Resolution::Answer(answer) => Self::from_answer(answer),
            Resolution::Superseded => Self::Superseded,
            Resolution::ConnectionLost => Self::ConnectionLost,
            Resolution::DeviceRemoved => Self::DeviceRemoved,
            Resolution::Cancelled => Self::Cancelled,
        }
    }

    /// The gateway accepted the command.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::AcceptedPendingAck)
    }
}

/// Final state of a ReCom request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RequestOutcome {
    Answered(Answer),
    TimedOut,
    Cancelled,
    ConnectionLost,
    DeviceRemoved,
}

impl RequestOutcome {
    pub(crate) fn from_resolution(resolution: Resolution) -> Self {
        match resolution {
            Resolution::Answer(answer) => Self::Answered(answer),
            // Requests carry no class, so nothing supersedes them.
            Resolution::Superseded | Resolution::Cancelled => Self::Cancelled,
            Resolution::ConnectionLost => Self::ConnectionLost,
            Resolution::DeviceRemoved => Self::DeviceRemoved,
        }
    }

    pub fn answer(&self) -> Option<&Answer> {
        match self {
            Self::Answered(answer) => Some(answer),
            _ => None,
        }
    }
}
