//! Device model synchronization and command dispatch for EnOcean-over-IP
//! gateways, on top of `greennet-api`.
//!
//! - **[`Gateway`]**: facade over one gateway connection.
//!   [`start()`](Gateway::start) spawns the sync engine, which subscribes,
//!   bootstraps the device set and applies live telegrams in arrival order.
//!
//! - **[`DeviceModel`]**: concurrent device registry (`DashMap` + `watch`
//!   snapshot) with per-device serialized updates, validated against the
//!   static [`profile`] catalog. Changes are broadcast as [`Event`]s.
//!
//! - **[`Command`]**: typed device commands, validated atomically before
//!   publishing. Answers are correlated by topic; a newer command of the
//!   same class supersedes an older one.

pub mod command;
pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod profile;
pub mod store;
pub mod stream;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandOutcome, PendingCommand, PendingRequest, Request, RequestOutcome};
pub use config::GatewayConfig;
pub use error::{CommandError, CoreError, Rejected};
pub use gateway::Gateway;
pub use profile::{EepInfo, Profile, ProfileId};
pub use store::{AppliedChange, Change, DeviceInfo, DeviceModel, Upserted};
pub use stream::{DeviceFilter, DeviceStream};
pub use sync::SyncState;

pub use model::{Attribute, AttributeValue, Channel, Condition, Device, DeviceId, Event, Severity};
