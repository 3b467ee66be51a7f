#![allow(clippy::unwrap_used)]

// Integration tests for the gateway against the in-memory transport.
//
// Every test drives the real engine task: connection events and inbound
// messages are injected, published traffic is inspected.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tokio::time::Instant;

use greennet_api::Function;
use greennet_api::transport::MemoryTransport;
use greennet_core::{
    AttributeValue, Command, CommandError, CommandOutcome, CoreError, DeviceId, Event, Gateway,
    GatewayConfig, ProfileId, Request, RequestOutcome, SyncState,
};

const BASE: &str = "EnOcean/G1";
const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    gateway: Gateway,
    transport: Arc<MemoryTransport>,
    events: broadcast::Receiver<Arc<Event>>,
}

impl Harness {
    async fn connected() -> Self {
        Self::connected_with(GatewayConfig::new("G1")).await
    }

    async fn connected_with(config: GatewayConfig) -> Self {
        let (transport, inbound) = MemoryTransport::new();
        let gateway = Gateway::new(config, transport.clone(), inbound);
        let events = gateway.events();
        gateway.start().await.unwrap();
        transport.connect().await;
        transport
            .wait_for(|p| p.topic == format!("{BASE}/get/devices"))
            .await;
        Self {
            gateway,
            transport,
            events,
        }
    }

    async fn synchronized(devices: Value) -> Self {
        let h = Self::connected().await;
        h.snapshot(devices).await;
        h
    }

    async fn snapshot(&self, devices: Value) {
        self.inject(
            "getAnswer/devices",
            json!({"header": {"httpStatus": 200}, "devices": devices}),
        )
        .await;
        self.wait_state(SyncState::Synchronized { bootstrapped: true })
            .await;
    }

    async fn inject(&self, suffix: &str, body: Value) {
        self.transport
            .inject(&format!("{BASE}/{suffix}"), body.to_string())
            .await;
    }

    async fn wait_state(&self, wanted: SyncState) {
        let mut state = self.gateway.sync_state();
        tokio::time::timeout(WAIT, state.wait_for(|s| *s == wanted))
            .await
            .unwrap()
            .unwrap();
    }

    /// Next event matching `pred`, skipping others.
    async fn next_event(&mut self, pred: impl Fn(&Event) -> bool) -> Arc<Event> {
        tokio::time::timeout(WAIT, async {
            loop {
                let event = self.events.recv().await.unwrap();
                if pred(&event) {
                    return event;
                }
            }
        })
        .await
        .unwrap()
    }

    async fn next_change(&mut self) -> Arc<Event> {
        self.next_event(|e| matches!(e, Event::AttributeChanged { .. }))
            .await
    }

    async fn answer(&self, device: &str, status: u16) {
        self.inject(
            &format!("putAnswer/devices/{device}/state"),
            json!({"header": {"httpStatus": status}}),
        )
        .await;
    }
}

fn switch(id: &str) -> Value {
    json!({"deviceId": id, "eeps": [{"eep": "D2-01-00"}]})
}

fn on() -> Vec<Function> {
    vec![Function::text("switch", "on")]
}

// ── Ingestion ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn device_delta_fires_attribute_changed_once() {
    let mut h = Harness::synchronized(json!([switch("0528C9BA")])).await;

    h.inject("stream/device/0528C9BA", json!({"switch": "on"})).await;
    let event = h.next_change().await;
    assert_eq!(
        *event,
        Event::AttributeChanged {
            device: "0528C9BA".into(),
            channel: 0,
            key: "switch".into(),
            previous: None,
            value: AttributeValue::Choice("on".into()),
        }
    );

    // The duplicate only refreshes; the next change event is the "off".
    h.inject("stream/device/0528C9BA", json!({"switch": "on"})).await;
    h.inject("stream/device/0528C9BA", json!({"switch": "off"})).await;
    let event = h.next_change().await;
    assert!(matches!(
        &*event,
        Event::AttributeChanged { previous: Some(AttributeValue::Choice(p)), .. } if p == "on"
    ));
}

#[tokio::test(start_paused = true)]
async fn fragmented_telegram_is_assembled() {
    let mut h = Harness::synchronized(json!([switch("0528C9BA")])).await;

    let topic = format!("{BASE}/stream/telegram/0528C9BA/from/functions/0");
    h.transport.inject(&format!("{topic}/key"), "switch").await;
    h.transport.inject(&format!("{topic}/value"), "on").await;
    // Radio-bound copies never touch the model.
    h.inject(
        "stream/telegram/0528C9BA/to",
        json!({"functions": [{"key": "switch", "value": "off"}]}),
    )
    .await;

    let event = h.next_change().await;
    assert!(matches!(&*event, Event::AttributeChanged { key, .. } if key == "switch"));
    let device = h.gateway.query_device_state("0528C9BA").unwrap();
    assert_eq!(device.value(0, "switch"), Some(&AttributeValue::Choice("on".into())));
}

#[tokio::test(start_paused = true)]
async fn out_of_range_value_is_rejected_and_reported() {
    let mut h = Harness::synchronized(json!([
        {"deviceId": "0528C9BA", "eeps": [{"eep": "D2-01-02"}]}
    ]))
    .await;

    h.inject("stream/device/0528C9BA", json!({"dimValue": 40})).await;
    h.next_change().await;
    h.inject("stream/device/0528C9BA", json!({"dimValue": 140})).await;

    let event = h
        .next_event(|e| matches!(e, Event::UpdateRejected { .. }))
        .await;
    assert!(matches!(&*event, Event::UpdateRejected { key, .. } if key == "dimValue"));
    let device = h.gateway.query_device_state("0528C9BA").unwrap();
    assert_eq!(device.value(0, "dimValue").unwrap().as_f64(), Some(40.0));
}

#[tokio::test(start_paused = true)]
async fn unknown_device_is_flagged_then_resolved() {
    let mut h = Harness::synchronized(json!([])).await;

    h.inject(
        "stream/telegram/05A1B2C3/from",
        json!({"functions": [{"key": "dimValue", "value": 30}], "telegramInfo": {"dbm": -71}}),
    )
    .await;
    h.next_event(|e| matches!(e, Event::ProfileUnresolved { .. }))
        .await;
    h.transport
        .wait_for(|p| p.topic == format!("{BASE}/get/devices/05A1B2C3/profile"))
        .await;

    h.inject(
        "getAnswer/devices/05A1B2C3/profile",
        json!({"header": {"httpStatus": 200}, "profile": {"eep": "D2-01-02"}}),
    )
    .await;
    h.next_event(|e| matches!(e, Event::ProfileReassigned { .. }))
        .await;

    let device = h.gateway.query_device_state("05A1B2C3").unwrap();
    assert_eq!(device.profile, ProfileId::Dimmer);
    assert!(device.profile_resolved);
    assert_eq!(device.dbm, Some(-71));
}

#[tokio::test(start_paused = true)]
async fn removal_on_devices_stream() {
    let mut h = Harness::synchronized(json!([switch("0528C9BA")])).await;
    let pending = h
        .gateway
        .send_command(&"0528C9BA".into(), &on(), Duration::from_secs(10))
        .unwrap();

    h.transport
        .inject(&format!("{BASE}/stream/devices/0528C9BA"), "")
        .await;
    h.next_event(|e| matches!(e, Event::DeviceRemoved { .. }))
        .await;

    assert_eq!(pending.outcome().await, CommandOutcome::DeviceRemoved);
    assert!(h.gateway.query_device_state("0528C9BA").is_none());
}

// ── Bootstrap ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn rebootstrap_reassigns_profiles_and_drops_stale_devices() {
    let h = Harness::synchronized(json!([
        {"deviceId": "01843197", "eeps": [{"eep": "D2-01-00"}], "states": {"switch": "on"}},
        switch("AAAA0001"),
    ]))
    .await;
    let device = h.gateway.query_device_state("01843197").unwrap();
    assert_eq!(device.value(0, "switch"), Some(&AttributeValue::Choice("on".into())));

    h.gateway.retry_bootstrap().unwrap();
    h.wait_state(SyncState::Bootstrapping).await;
    h.snapshot(json!([{"deviceId": "01843197", "eeps": [{"eep": "D2-01-02"}]}]))
        .await;

    let device = h.gateway.query_device_state("01843197").unwrap();
    assert_eq!(device.profile, ProfileId::Dimmer);
    assert!(device.value(0, "switch").is_none());
    assert!(device.value(0, "dimValue").is_none());
    assert!(h.gateway.query_device_state("AAAA0001").is_none());
    assert_eq!(h.gateway.devices_snapshot().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn bootstrap_retries_coalesce_until_shutdown() {
    let (transport, inbound) = MemoryTransport::new();
    let gateway = Gateway::new(GatewayConfig::new("G1"), transport, inbound);

    for _ in 0..32 {
        gateway.retry_bootstrap().unwrap();
    }

    gateway.start().await.unwrap();
    gateway.shutdown().await;
    assert!(matches!(
        gateway.retry_bootstrap(),
        Err(CoreError::ShuttingDown)
    ));
}

#[tokio::test(start_paused = true)]
async fn stream_messages_during_bootstrap_are_replayed() {
    let mut h = Harness::connected().await;

    h.inject("stream/device/0528C9BA", json!({"switch": "on"})).await;
    h.snapshot(json!([switch("0528C9BA")])).await;

    let event = h.next_change().await;
    assert!(matches!(&*event, Event::AttributeChanged { key, .. } if key == "switch"));
    let device = h.gateway.query_device_state("0528C9BA").unwrap();
    assert_eq!(device.profile, ProfileId::Switch1Ch);
    assert!(device.profile_resolved);
}

#[tokio::test(start_paused = true)]
async fn missing_snapshot_times_out_and_late_one_still_applies() {
    let mut h = Harness::connected_with(GatewayConfig {
        bootstrap_timeout: Duration::from_secs(1),
        ..GatewayConfig::new("G1")
    })
    .await;

    h.wait_state(SyncState::Synchronized {
        bootstrapped: false,
    })
    .await;
    h.next_event(|e| matches!(e, Event::BootstrapFailed { .. }))
        .await;

    h.snapshot(json!([switch("0528C9BA")])).await;
    assert!(h.gateway.query_device_state("0528C9BA").is_some());
}

// ── Commands ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn newer_command_supersedes_older_one() {
    let h = Harness::synchronized(json!([switch("0528C9BA")])).await;
    let id = DeviceId::from("0528C9BA");

    let a = h
        .gateway
        .send_command(&id, &on(), Duration::from_secs(10))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let b = h
        .gateway
        .execute(&id, &Command::TurnOff { channel: 0 })
        .unwrap();

    assert_eq!(a.outcome().await, CommandOutcome::Superseded);

    // A's late answer is swallowed; B gets its own.
    h.answer("0528C9BA", 200).await;
    h.answer("0528C9BA", 201).await;
    assert_eq!(b.outcome().await, CommandOutcome::AcceptedPendingAck);

    let sent = h
        .transport
        .published_to(&format!("{BASE}/put/devices/0528C9BA/state"));
    assert_eq!(sent.len(), 2);
    assert_eq!(
        sent[1].json(),
        json!({"state": {"functions": [{"key": "switch", "value": "off"}]}})
    );
}

#[tokio::test(start_paused = true)]
async fn unanswered_command_times_out_at_deadline() {
    let h = Harness::synchronized(json!([switch("0528C9BA")])).await;
    let started = Instant::now();
    let pending = h
        .gateway
        .send_command(&"0528C9BA".into(), &on(), Duration::from_millis(500))
        .unwrap();

    let outcome = pending.outcome();
    tokio::pin!(outcome);
    assert!(
        tokio::time::timeout(Duration::from_millis(499), &mut outcome)
            .await
            .is_err()
    );
    assert_eq!(outcome.await, CommandOutcome::TimedOut);
    assert!(started.elapsed() >= Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn answers_after_a_timeout_reach_their_own_command() {
    let h = Harness::synchronized(json!([switch("0528C9BA")])).await;
    let id = DeviceId::from("0528C9BA");

    let silent = h
        .gateway
        .send_command(&id, &on(), Duration::from_millis(500))
        .unwrap();
    assert_eq!(silent.outcome().await, CommandOutcome::TimedOut);

    for _ in 0..2 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let pending = h
            .gateway
            .send_command(&id, &on(), Duration::from_secs(10))
            .unwrap();
        h.answer("0528C9BA", 200).await;
        let outcome = pending.outcome().await;
        assert!(
            matches!(outcome, CommandOutcome::Success { .. }),
            "{outcome:?}"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn failed_status_carries_detail() {
    let h = Harness::synchronized(json!([switch("0528C9BA")])).await;
    let pending = h
        .gateway
        .send_command(&"0528C9BA".into(), &on(), Duration::from_secs(10))
        .unwrap();
    h.inject(
        "putAnswer/devices/0528C9BA/state",
        json!({"header": {"httpStatus": 409, "message": "busy"}}),
    )
    .await;
    assert_eq!(
        pending.outcome().await,
        CommandOutcome::Failed {
            status: 409,
            detail: Some("busy".into())
        }
    );
}

#[tokio::test(start_paused = true)]
async fn invalid_command_is_never_published() {
    let h = Harness::synchronized(json!([switch("0528C9BA")])).await;
    let before = h.transport.published().len();

    let err = h
        .gateway
        .send_command(
            &"0528C9BA".into(),
            &[Function::text("switch", "on"), Function::text("dimValue", 20)],
            Duration::from_secs(1),
        )
        .unwrap_err();

    assert!(matches!(err, CommandError::InvalidCommand { ref key, .. } if key == "dimValue"));
    assert_eq!(h.transport.published().len(), before);
}

#[tokio::test(start_paused = true)]
async fn disconnect_fails_pending_and_refuses_new_commands() {
    let h = Harness::synchronized(json!([switch("0528C9BA")])).await;
    let pending = h
        .gateway
        .send_command(&"0528C9BA".into(), &on(), Duration::from_secs(10))
        .unwrap();

    h.transport.disconnect("broker restarted").await;
    assert_eq!(pending.outcome().await, CommandOutcome::ConnectionLost);
    h.wait_state(SyncState::Disconnected).await;

    assert!(matches!(
        h.gateway
            .send_command(&"0528C9BA".into(), &on(), Duration::from_secs(1)),
        Err(CommandError::NotConnected)
    ));
}

#[tokio::test(start_paused = true)]
async fn system_info_request_round_trip() {
    let h = Harness::synchronized(json!([])).await;
    let pending = h.gateway.request(&Request::SystemInfo).unwrap();
    h.inject(
        "getAnswer/config/system/info",
        json!({"header": {"httpStatus": 200}, "version": "2.4.1"}),
    )
    .await;

    match pending.outcome().await {
        RequestOutcome::Answered(answer) => {
            assert_eq!(answer.status, 200);
            assert_eq!(answer.data, json!({"version": "2.4.1"}));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_pending_commands() {
    let h = Harness::synchronized(json!([switch("0528C9BA")])).await;
    let pending = h
        .gateway
        .send_command(&"0528C9BA".into(), &on(), Duration::from_secs(10))
        .unwrap();

    h.gateway.shutdown().await;
    assert_eq!(pending.outcome().await, CommandOutcome::Cancelled);
    assert_eq!(*h.gateway.sync_state().borrow(), SyncState::Disconnected);
}
