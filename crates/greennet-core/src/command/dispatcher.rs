// ── Command dispatcher ──
//
// Validates, publishes and registers commands and requests. Publishing
// never waits on ingestion: the caller gets a handle right after the
// transport accepted the message and awaits the answer on its own.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use greennet_api::payload::encode_command;
use greennet_api::{Error, Function, Qos, Topics, Transport};

use super::pending::{PendingCommand, PendingRequest, PendingTable};
use super::requests::Request;
use super::validate;
use crate::error::CommandError;
use crate::model::DeviceId;
use crate::store::DeviceModel;
use crate::sync::SyncState;

pub(crate) struct Dispatcher {
    topics: Topics,
    transport: Arc<dyn Transport>,
    model: Arc<DeviceModel>,
    table: Arc<PendingTable>,
    sync_state: watch::Receiver<SyncState>,
}

impl Dispatcher {
    pub(crate) fn new(
        topics: Topics,
        transport: Arc<dyn Transport>,
        model: Arc<DeviceModel>,
        table: Arc<PendingTable>,
        sync_state: watch::Receiver<SyncState>,
    ) -> Self {
        Self {
            topics,
            transport,
            model,
            table,
            sync_state,
        }
    }

    /// Validate and publish a function list on the device's `put` topic.
    ///
    /// The timeout starts once the transport accepted the publish. A
    /// still-pending older command of the same class and channel resolves
    /// as superseded.
    pub(crate) fn send_command(
        &self,
        device_id: &DeviceId,
        functions: &[Function],
        timeout: Duration,
    ) -> Result<PendingCommand, CommandError> {
        self.ensure_connected()?;
        let device = self
            .model
            .device(device_id.as_str())
            .ok_or_else(|| CommandError::UnknownDevice {
                device: device_id.clone(),
            })?;
        let checked = validate::check(&device, functions)?;
        let payload = encode_command(&checked.functions)?;

        let topic = self.topics.put_state(device_id.as_str());
        let answer_topic = answer_topic(&self.topics, &topic)?;
        let (id, rx) = self.table.register(
            &answer_topic,
            Some(device_id.clone()),
            Some((checked.class, checked.channel)),
        );

        self.publish(&topic, &answer_topic, id, payload)?;
        let deadline = Instant::now() + timeout;

        let superseded = self.table.supersede(&answer_topic, id);
        debug!(
            device = %device_id,
            class = %checked.class,
            channel = checked.channel,
            superseded,
            "command published"
        );

        Ok(PendingCommand::new(
            Arc::clone(&self.table),
            device_id.clone(),
            answer_topic,
            id,
            rx,
            deadline,
        ))
    }

    /// Publish a ReCom request and register for its answer.
    pub(crate) fn send_request(
        &self,
        request: &Request,
        timeout: Duration,
    ) -> Result<PendingRequest, CommandError> {
        self.ensure_connected()?;
        if let Some(device) = request.device() {
            if self.model.device(device.as_str()).is_none() {
                return Err(CommandError::UnknownDevice {
                    device: device.clone(),
                });
            }
        }

        let topic = request.topic(&self.topics);
        let answer_topic = answer_topic(&self.topics, &topic)?;
        let payload = request.payload().map_err(Error::from)?;
        let (id, rx) = self
            .table
            .register(&answer_topic, request.device().cloned(), None);

        self.publish(&topic, &answer_topic, id, payload)?;
        debug!(%topic, "request published");

        Ok(PendingRequest::new(
            Arc::clone(&self.table),
            answer_topic,
            id,
            rx,
            Instant::now() + timeout,
        ))
    }

    fn publish(
        &self,
        topic: &str,
        answer_topic: &str,
        id: u64,
        payload: Bytes,
    ) -> Result<(), CommandError> {
        if let Err(e) = self.transport.publish(topic, payload, Qos::AtLeastOnce) {
            warn!(topic, error = %e, "publish failed");
            self.table.remove(answer_topic, id);
            return Err(CommandError::Publish(e));
        }
        Ok(())
    }

    fn ensure_connected(&self) -> Result<(), CommandError> {
        if matches!(*self.sync_state.borrow(), SyncState::Disconnected) {
            return Err(CommandError::NotConnected);
        }
        Ok(())
    }
}

/// The topic the gateway answers `request_topic` on.
pub(crate) fn answer_topic(topics: &Topics, request_topic: &str) -> Result<String, Error> {
    let mut addr = topics.decode(request_topic)?;
    addr.category = addr.category.answer().ok_or_else(|| Error::MalformedTopic {
        topic: request_topic.to_owned(),
        reason: "not a request topic".into(),
    })?;
    Ok(addr.encode(topics.base()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn answer_topics_mirror_requests() {
        let topics = Topics::new("EnOcean", "G1");
        assert_eq!(
            answer_topic(&topics, &topics.put_state("0528C9BA")).unwrap(),
            "EnOcean/G1/putAnswer/devices/0528C9BA/state"
        );
        assert_eq!(
            answer_topic(&topics, &topics.get_system("info")).unwrap(),
            "EnOcean/G1/getAnswer/config/system/info"
        );
        assert!(answer_topic(&topics, "EnOcean/G1/stream/device/0528C9BA").is_err());
    }
}
