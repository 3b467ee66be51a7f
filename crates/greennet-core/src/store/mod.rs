// ── Reactive device store ──
//
// Device registry with per-device serialized mutation, `watch` snapshots
// and a `broadcast` event channel.

mod device_model;
mod update;

pub use device_model::{DeviceInfo, DeviceModel, Upserted};
pub use update::{AppliedChange, Change};
