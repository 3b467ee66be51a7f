// ── Transport boundary ──
//
// The sync engine consumes a broker connection only through this trait
// plus a channel of connection and message events. Connection lifecycle
// (connect, retry, TLS) belongs to the implementation.

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::Error;

/// Capacity of the event channel handed to consumers.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Delivery guarantee requested for a publish or subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
}

/// A message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Bytes,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Connection and message notifications from a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Disconnected { reason: String },
    Message(InboundMessage),
}

/// Receiving half of a transport's event channel.
pub type TransportEvents = mpsc::Receiver<TransportEvent>;

/// Publish/subscribe primitives of a broker connection.
///
/// Both calls enqueue and return without waiting for the broker; the
/// outcome of a request is observed through its answer topic.
pub trait Transport: Send + Sync + 'static {
    fn publish(&self, topic: &str, payload: Bytes, qos: Qos) -> Result<(), Error>;

    fn subscribe(&self, filter: &str, qos: Qos) -> Result<(), Error>;
}

// ── In-memory transport ─────────────────────────────────────────────

#[cfg(any(test, feature = "test-support"))]
pub use memory::{MemoryTransport, Published};

#[cfg(any(test, feature = "test-support"))]
mod memory {
    use std::sync::{Arc, Mutex, PoisonError};

    use bytes::Bytes;
    use tokio::sync::{Notify, mpsc};

    use super::{EVENT_CHANNEL_CAPACITY, InboundMessage, Qos, Transport, TransportEvent, TransportEvents};
    use crate::error::Error;

    /// A publish recorded by [`MemoryTransport`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Published {
        pub topic: String,
        pub payload: Bytes,
        pub qos: Qos,
    }

    impl Published {
        pub fn json(&self) -> serde_json::Value {
            serde_json::from_slice(&self.payload).unwrap_or(serde_json::Value::Null)
        }
    }

    /// Loopback transport for tests: records outbound traffic and lets
    /// the test drive connection and message events.
    pub struct MemoryTransport {
        events: mpsc::Sender<TransportEvent>,
        published: Mutex<Vec<Published>>,
        subscriptions: Mutex<Vec<String>>,
        fail_publish: Mutex<bool>,
        notify: Notify,
    }

    impl MemoryTransport {
        pub fn new() -> (Arc<Self>, TransportEvents) {
            let (events, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
            let transport = Arc::new(Self {
                events,
                published: Mutex::new(Vec::new()),
                subscriptions: Mutex::new(Vec::new()),
                fail_publish: Mutex::new(false),
                notify: Notify::new(),
            });
            (transport, rx)
        }

        pub async fn connect(&self) {
            let _ = self.events.send(TransportEvent::Connected).await;
        }

        pub async fn disconnect(&self, reason: &str) {
            let _ = self
                .events
                .send(TransportEvent::Disconnected {
                    reason: reason.into(),
                })
                .await;
        }

        /// Deliver an inbound message as if the broker had routed it.
        pub async fn inject(&self, topic: &str, payload: impl Into<Bytes>) {
            let _ = self
                .events
                .send(TransportEvent::Message(InboundMessage::new(topic, payload)))
                .await;
        }

        pub fn set_fail_publish(&self, fail: bool) {
            *self.fail_publish.lock().unwrap_or_else(PoisonError::into_inner) = fail;
        }

        pub fn published(&self) -> Vec<Published> {
            self.published
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        pub fn published_to(&self, topic: &str) -> Vec<Published> {
            self.published()
                .into_iter()
                .filter(|p| p.topic == topic)
                .collect()
        }

        pub fn subscriptions(&self) -> Vec<String> {
            self.subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Wait until a publish matching `pred` has been recorded.
        pub async fn wait_for(&self, pred: impl Fn(&Published) -> bool) -> Published {
            loop {
                let notified = self.notify.notified();
                if let Some(found) = self.published().into_iter().find(|p| pred(p)) {
                    return found;
                }
                notified.await;
            }
        }
    }

    impl Transport for MemoryTransport {
        fn publish(&self, topic: &str, payload: Bytes, qos: Qos) -> Result<(), Error> {
            if *self.fail_publish.lock().unwrap_or_else(PoisonError::into_inner) {
                return Err(Error::Connection("publish refused".into()));
            }
            self.published
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(Published {
                    topic: topic.to_owned(),
                    payload,
                    qos,
                });
            self.notify.notify_waiters();
            Ok(())
        }

        fn subscribe(&self, filter: &str, _qos: Qos) -> Result<(), Error> {
            self.subscriptions
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(filter.to_owned());
            Ok(())
        }
    }
}
