// ── Synchronization engine ──
//
// Owns the inbound side of one gateway connection: subscriptions, the
// bootstrap state machine, fragment assembly and routing of stream
// messages into the device model and of answers into the pending table.
// Runs as a single task, so messages are applied in arrival order.

mod assembler;

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use greennet_api::payload::{self, DeviceDescriptor};
use greennet_api::topic::DeviceResource;
use greennet_api::{
    Category, Direction, Function, InboundMessage, Qos, Resource, TopicAddress, Topics, Transport,
    TransportEvent, TransportEvents,
};

use self::assembler::{Assembled, FragmentAssembler, FragmentKey, StreamKind};
use crate::command::{Delivery, PendingTable, Resolution};
use crate::config::GatewayConfig;
use crate::error::Rejected;
use crate::model::{DeviceId, Event};
use crate::profile::{self, ProfileId};
use crate::store::{DeviceInfo, DeviceModel, Upserted};

// ── SyncState ───────────────────────────────────────────────────────

/// Connection phase observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncState {
    Disconnected,
    /// Connected, waiting for the device snapshot.
    Bootstrapping,
    /// Applying live updates. `bootstrapped` is `false` when the snapshot
    /// never arrived and a retry is advisable.
    Synchronized { bootstrapped: bool },
}

impl SyncState {
    pub fn is_connected(self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

/// Requests from the facade to the engine task.
#[derive(Debug)]
pub(crate) enum Control {
    RetryBootstrap,
}

// ── Engine ──────────────────────────────────────────────────────────

pub(crate) struct SyncEngine {
    topics: Topics,
    transport: Arc<dyn Transport>,
    model: Arc<DeviceModel>,
    table: Arc<PendingTable>,
    state: watch::Sender<SyncState>,
    bootstrap_timeout: Duration,
    bootstrap_deadline: Option<Instant>,
    assembler: FragmentAssembler,
    replay: VecDeque<InboundMessage>,
    replay_capacity: usize,
}

impl SyncEngine {
    pub(crate) fn new(
        config: &GatewayConfig,
        transport: Arc<dyn Transport>,
        model: Arc<DeviceModel>,
        table: Arc<PendingTable>,
        state: watch::Sender<SyncState>,
    ) -> Self {
        Self {
            topics: Topics::new(&config.topic_base, &config.gateway_id),
            transport,
            model,
            table,
            state,
            bootstrap_timeout: config.bootstrap_timeout,
            bootstrap_deadline: None,
            assembler: FragmentAssembler::new(config.fragment_quiet_period),
            replay: VecDeque::new(),
            replay_capacity: config.replay_buffer.max(1),
        }
    }

    /// Process transport events until cancelled or the transport goes away.
    pub(crate) async fn run(
        mut self,
        mut events: TransportEvents,
        mut control: mpsc::Receiver<Control>,
        cancel: CancellationToken,
    ) {
        loop {
            let bootstrap_at = self.bootstrap_deadline;
            let flush_at = self.assembler.next_deadline();

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                Some(request) = control.recv() => self.handle_control(request),
                () = sleep_until(bootstrap_at) => self.bootstrap_timed_out(),
                () = sleep_until(flush_at) => self.flush_due(),
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        self.on_disconnected("transport closed");
                        break;
                    }
                },
            }
        }
        self.set_state(SyncState::Disconnected);
        debug!("sync engine stopped");
    }

    fn handle_control(&mut self, request: Control) {
        match request {
            Control::RetryBootstrap => {
                if self.current_state().is_connected() {
                    self.begin_bootstrap();
                } else {
                    warn!("bootstrap retry ignored while disconnected");
                }
            }
        }
    }

    fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => self.on_connected(),
            TransportEvent::Disconnected { reason } => self.on_disconnected(&reason),
            TransportEvent::Message(message) => self.handle_message(message),
        }
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    fn on_connected(&mut self) {
        info!(gateway = self.topics.gateway_id(), "transport connected");
        for filter in self.topics.subscriptions() {
            if let Err(e) = self.transport.subscribe(&filter, Qos::AtLeastOnce) {
                warn!(%filter, error = %e, "subscribe failed");
            }
        }
        self.begin_bootstrap();
    }

    fn on_disconnected(&mut self, reason: &str) {
        if self.current_state() != SyncState::Disconnected {
            info!(reason, "transport disconnected");
        }
        self.set_state(SyncState::Disconnected);
        self.bootstrap_deadline = None;
        self.assembler.clear();
        self.replay.clear();
        self.table.fail_all(&Resolution::ConnectionLost);
    }

    fn begin_bootstrap(&mut self) {
        self.set_state(SyncState::Bootstrapping);
        self.bootstrap_deadline = Some(Instant::now() + self.bootstrap_timeout);
        let topic = self.topics.get_devices();
        if let Err(e) = self
            .transport
            .publish(&topic, empty_body(), Qos::AtLeastOnce)
        {
            warn!(%topic, error = %e, "discovery request failed");
        }
    }

    fn bootstrap_timed_out(&mut self) {
        self.bootstrap_deadline = None;
        let reason = format!(
            "no device snapshot within {}ms",
            self.bootstrap_timeout.as_millis()
        );
        warn!(%reason, "bootstrap failed");
        self.model.emit(Event::BootstrapFailed { reason });
        self.set_state(SyncState::Synchronized {
            bootstrapped: false,
        });
        self.drain_replay();
    }

    // ── Inbound routing ──────────────────────────────────────────────

    fn handle_message(&mut self, message: InboundMessage) {
        let addr = match self.topics.decode(&message.topic) {
            Ok(addr) => addr,
            Err(e) => {
                debug!(topic = %message.topic, error = %e, "message dropped");
                return;
            }
        };

        match addr.category {
            Category::Stream if self.current_state() == SyncState::Bootstrapping => {
                self.buffer(message);
            }
            Category::Stream => self.route_stream(&addr, &message.payload),
            Category::GetAnswer | Category::PutAnswer => {
                self.route_answer(&addr, &message.topic, &message.payload);
            }
            Category::Get | Category::Put => {
                trace!(topic = %message.topic, "request echo ignored");
            }
        }
    }

    fn buffer(&mut self, message: InboundMessage) {
        if self.replay.len() >= self.replay_capacity {
            if let Some(dropped) = self.replay.pop_front() {
                warn!(topic = %dropped.topic, "replay buffer full, oldest message dropped");
            }
        }
        self.replay.push_back(message);
    }

    fn drain_replay(&mut self) {
        if !self.replay.is_empty() {
            debug!(messages = self.replay.len(), "replaying buffered messages");
        }
        while let Some(message) = self.replay.pop_front() {
            self.handle_message(message);
        }
    }

    fn route_stream(&mut self, addr: &TopicAddress, payload: &Bytes) {
        let Some(device) = addr.device_id.as_deref().map(DeviceId::from) else {
            return;
        };
        let kind = match addr.resource {
            Resource::Telegram if addr.direction == Some(Direction::To) => {
                trace!(device = %device, "outbound telegram ignored");
                return;
            }
            Resource::Telegram => StreamKind::Telegram,
            Resource::Device => StreamKind::Delta,
            Resource::Devices => StreamKind::Descriptor,
            Resource::Config => return,
        };
        let key: FragmentKey = (kind, device);

        if !addr.sub_path.is_empty() {
            let base = TopicAddress {
                sub_path: Vec::new(),
                ..addr.clone()
            };
            self.assembler
                .push(key, &base.encode(self.topics.base()), &addr.sub_path, payload);
            return;
        }

        // Fragments for the same device go first to keep arrival order.
        if let Some(assembled) = self.assembler.take(&key) {
            self.apply_assembled(assembled);
        }
        let topic = addr.encode(self.topics.base());
        let (kind, device) = key;

        if kind == StreamKind::Descriptor && payload::is_removal(payload) {
            self.remove_device(&device);
            return;
        }
        match payload::parse_json(&topic, payload) {
            Ok(value) => self.apply_value(kind, &device, &topic, &value),
            Err(e) => warn!(device = %device, error = %e, "stream message dropped"),
        }
    }

    fn flush_due(&mut self) {
        for assembled in self.assembler.take_due(Instant::now()) {
            self.apply_assembled(assembled);
        }
    }

    fn apply_assembled(&mut self, assembled: Assembled) {
        let Assembled {
            key: (kind, device),
            topic,
            value,
            fragments,
        } = assembled;
        trace!(device = %device, fragments, "fragments assembled");

        if kind == StreamKind::Descriptor && is_removal_value(&value) {
            self.remove_device(&device);
            return;
        }
        self.apply_value(kind, &device, &topic, &value);
    }

    fn apply_value(&mut self, kind: StreamKind, device: &DeviceId, topic: &str, value: &Value) {
        match kind {
            StreamKind::Descriptor => {
                match DeviceDescriptor::from_json(value, Some(device.as_str())) {
                    Some(descriptor) => {
                        self.apply_descriptor(&descriptor);
                    }
                    None => warn!(device = %device, "unusable device descriptor"),
                }
            }
            StreamKind::Telegram | StreamKind::Delta => {
                let body = match payload::decode_body(topic, value) {
                    Ok(body) => body,
                    Err(e) => {
                        warn!(device = %device, error = %e, "telegram dropped");
                        return;
                    }
                };
                if body.is_outbound() {
                    return;
                }
                if self.model.ensure_device(device) {
                    info!(device = %device, "unknown device, requesting profile");
                    self.request_profile(device);
                }
                self.model
                    .record_radio(device, body.friendly_id.as_deref(), body.dbm);
                self.apply_functions(device, &body.functions);
            }
        }
    }

    /// Apply a function list; a `channel` function addresses the rest.
    fn apply_functions(&self, device: &DeviceId, functions: &[Function]) {
        let channel = match functions.iter().find(|f| f.key == "channel") {
            None => 0,
            Some(f) => match f.value_text().trim().parse::<u8>() {
                Ok(channel) => channel,
                Err(_) => {
                    warn!(device = %device, channel = %f.value, "invalid channel, update dropped");
                    return;
                }
            },
        };

        for function in functions.iter().filter(|f| f.key != "channel") {
            if let Err(Rejected::InvalidValue { key, reason }) =
                self.model
                    .apply_update(device, channel, &function.key, &function.value)
            {
                warn!(device = %device, channel, %key, %reason, "value rejected");
            }
        }
    }

    /// Upsert a discovered device and apply its initial states.
    fn apply_descriptor(&self, descriptor: &DeviceDescriptor) -> DeviceId {
        let id = DeviceId::from(descriptor.device_id.as_str());
        let eep = descriptor.eep.as_deref().map(profile::eep_info);

        let outcome = self.model.upsert(DeviceInfo {
            id: id.clone(),
            profile: eep.map(|info| info.profile),
            channels: eep.map_or(1, |info| info.channels),
            tilt: eep.is_some_and(|info| info.tilt),
            eep: descriptor.eep.clone(),
            friendly_id: descriptor.friendly_id.clone(),
            manufacturer: descriptor.manufacturer.clone(),
            dbm: descriptor.dbm,
        });
        match outcome {
            Upserted::Created if eep.is_none() => self.request_profile(&id),
            Upserted::Reassigned { previous } => info!(
                device = %id,
                %previous,
                profile = %eep.map_or(ProfileId::Unknown, |info| info.profile),
                "profile reassigned"
            ),
            _ => {}
        }

        self.apply_functions(&id, &descriptor.states);
        id
    }

    fn remove_device(&self, device: &DeviceId) {
        if self.model.remove_device(device).is_some() {
            let cancelled = self.table.fail_device(device);
            info!(device = %device, cancelled, "device removed");
        }
    }

    fn request_profile(&self, device: &DeviceId) {
        let topic = self.topics.get_device(device.as_str(), DeviceResource::Profile);
        if let Err(e) = self
            .transport
            .publish(&topic, empty_body(), Qos::AtLeastOnce)
        {
            warn!(device = %device, error = %e, "profile request failed");
        }
    }

    // ── Answers ──────────────────────────────────────────────────────

    fn route_answer(&mut self, addr: &TopicAddress, topic: &str, payload: &Bytes) {
        let is_devices = addr.category == Category::GetAnswer && addr.resource == Resource::Devices;

        if is_devices && addr.device_id.is_none() && addr.sub_path.is_empty() {
            self.apply_snapshot(topic, payload);
            return;
        }

        let answer = match payload::decode_answer(topic, payload) {
            Ok(answer) => answer,
            Err(e) => {
                warn!(topic, error = %e, "answer dropped");
                return;
            }
        };

        if is_devices && addr.sub_path.first().map(String::as_str) == Some("profile") {
            if let Some(device) = addr.device_id.as_deref() {
                self.apply_profile_answer(device, &answer.data);
            }
        }

        let status = answer.status;
        if self.table.resolve(topic, answer) == Delivery::Unsolicited {
            debug!(topic, status, "unsolicited answer");
        }
    }

    fn apply_profile_answer(&self, device: &str, data: &Value) {
        let body = data.get("profile").unwrap_or(data);
        match DeviceDescriptor::from_json(body, Some(device)) {
            Some(descriptor) if descriptor.eep.is_some() => {
                self.apply_descriptor(&descriptor);
            }
            _ => debug!(device, "profile answer without eep"),
        }
    }

    fn apply_snapshot(&mut self, topic: &str, payload: &Bytes) {
        let data = match payload::decode_answer(topic, payload) {
            Ok(answer) if answer.is_success() => answer.data,
            Ok(answer) => {
                self.fail_bootstrap(format!(
                    "discovery answered {}{}",
                    answer.status,
                    answer.detail.map(|d| format!(": {d}")).unwrap_or_default()
                ));
                return;
            }
            // Some firmwares omit the header on the snapshot.
            Err(_) => match payload::parse_json(topic, payload) {
                Ok(value) => value,
                Err(e) => {
                    warn!(topic, error = %e, "device snapshot dropped");
                    return;
                }
            },
        };

        let descriptors = match payload::decode_device_list(topic, &data) {
            Ok(list) => list,
            Err(e) => {
                warn!(topic, error = %e, "device snapshot dropped");
                return;
            }
        };

        let keep: HashSet<DeviceId> = descriptors
            .iter()
            .map(|d| self.apply_descriptor(d))
            .collect();
        for stale in self.model.retain_only(&keep) {
            let cancelled = self.table.fail_device(&stale);
            info!(device = %stale, cancelled, "stale device removed");
        }

        info!(devices = keep.len(), "bootstrap completed");
        self.model.emit(Event::BootstrapCompleted {
            devices: keep.len(),
        });
        self.bootstrap_deadline = None;
        self.set_state(SyncState::Synchronized { bootstrapped: true });
        self.drain_replay();
    }

    fn fail_bootstrap(&mut self, reason: String) {
        warn!(%reason, "bootstrap failed");
        self.model.emit(Event::BootstrapFailed { reason });
        self.bootstrap_deadline = None;
        self.set_state(SyncState::Synchronized {
            bootstrapped: false,
        });
        self.drain_replay();
    }

    // ── State helpers ────────────────────────────────────────────────

    fn current_state(&self) -> SyncState {
        *self.state.borrow()
    }

    fn set_state(&self, next: SyncState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            debug!(from = ?*state, to = ?next, "sync state");
            *state = next;
            true
        });
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn empty_body() -> Bytes {
    Bytes::from_static(b"{}")
}

fn is_removal_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => {
            map.is_empty() || map.get("deleted").and_then(Value::as_bool) == Some(true)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn removal_values() {
        assert!(is_removal_value(&Value::Null));
        assert!(is_removal_value(&json!({})));
        assert!(is_removal_value(&json!({"deleted": true})));
        assert!(!is_removal_value(&json!({"deleted": false, "deviceId": "A"})));
        assert!(!is_removal_value(&json!([])));
    }

    #[test]
    fn only_disconnected_is_offline() {
        assert!(!SyncState::Disconnected.is_connected());
        assert!(SyncState::Bootstrapping.is_connected());
        assert!(
            SyncState::Synchronized {
                bootstrapped: false
            }
            .is_connected()
        );
    }
}
