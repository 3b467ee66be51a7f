// ── Domain model ──
//
// Devices, their channels, typed attribute values and active conditions,
// plus the events emitted when any of them change.

mod device;
mod device_id;
mod event;
mod value;

pub use device::{Attribute, Channel, Condition, Device};
pub use device_id::DeviceId;
pub use event::Event;
pub use value::{AttributeValue, Severity};
