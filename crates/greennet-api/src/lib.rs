// greennet-api: wire-level building blocks for EnOcean-over-IP gateways (topics, payloads, MQTT)

pub mod error;
pub mod mqtt;
pub mod payload;
pub mod topic;
pub mod transport;

pub use error::Error;
pub use payload::{Answer, DeviceDescriptor, Function};
pub use topic::{Category, Direction, Resource, TopicAddress, Topics};
pub use transport::{InboundMessage, Qos, Transport, TransportEvent, TransportEvents};
