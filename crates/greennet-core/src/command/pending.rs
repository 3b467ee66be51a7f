// ── Pending command table ──
//
// Answers carry no correlation id, only the topic they arrive on. Each
// answer topic has a FIFO of outstanding slots; the first answer goes to
// the oldest slot. A superseded or cancelled slot stays in the queue as
// an orphan until `late_answer_grace` passes, so its late answer is
// swallowed instead of resolving a newer command. A timed-out slot leaves
// the queue together with any orphans still ahead of it: no answer came
// for them either.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

use greennet_api::Answer;

use super::{CommandOutcome, RequestOutcome};
use crate::model::DeviceId;
use crate::profile::CommandClass;

/// How a slot was settled, delivered to its waiter.
#[derive(Debug, Clone)]
pub(crate) enum Resolution {
    Answer(Answer),
    Superseded,
    ConnectionLost,
    DeviceRemoved,
    Cancelled,
}

/// What happened to an incoming answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    /// Consumed by an orphaned slot.
    Discarded,
    Unsolicited,
}

enum SlotState {
    Waiting(oneshot::Sender<Resolution>),
    Orphaned { until: Instant },
}

struct Slot {
    id: u64,
    device: Option<DeviceId>,
    /// Supersede scope: class plus channel.
    class: Option<(CommandClass, u8)>,
    state: SlotState,
}

impl Slot {
    fn settle(&mut self, resolution: Resolution, until: Instant) {
        let state = std::mem::replace(&mut self.state, SlotState::Orphaned { until });
        if let SlotState::Waiting(tx) = state {
            let _ = tx.send(resolution);
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.state, SlotState::Orphaned { until } if until <= now)
    }
}

pub(crate) struct PendingTable {
    queues: DashMap<String, VecDeque<Slot>>,
    next_id: AtomicU64,
    grace: Duration,
}

impl PendingTable {
    pub(crate) fn new(grace: Duration) -> Self {
        Self {
            queues: DashMap::new(),
            next_id: AtomicU64::new(1),
            grace,
        }
    }

    /// Append a waiting slot for `answer_topic`.
    pub(crate) fn register(
        &self,
        answer_topic: &str,
        device: Option<DeviceId>,
        class: Option<(CommandClass, u8)>,
    ) -> (u64, oneshot::Receiver<Resolution>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.queues
            .entry(answer_topic.to_owned())
            .or_default()
            .push_back(Slot {
                id,
                device,
                class,
                state: SlotState::Waiting(tx),
            });
        (id, rx)
    }

    /// Resolve every older waiting slot in the same class as `Superseded`.
    pub(crate) fn supersede(&self, answer_topic: &str, newer: u64) -> usize {
        let Some(mut queue) = self.queues.get_mut(answer_topic) else {
            return 0;
        };
        let Some(class) = queue.iter().find(|s| s.id == newer).and_then(|s| s.class) else {
            return 0;
        };
        let until = Instant::now() + self.grace;
        let mut superseded = 0;
        for slot in queue.iter_mut() {
            if slot.id < newer
                && slot.class == Some(class)
                && matches!(slot.state, SlotState::Waiting(_))
            {
                slot.settle(Resolution::Superseded, until);
                superseded += 1;
            }
        }
        superseded
    }

    /// Drop a slot outright (its publish failed).
    pub(crate) fn remove(&self, answer_topic: &str, id: u64) {
        if let Some(mut queue) = self.queues.get_mut(answer_topic) {
            queue.retain(|s| s.id != id);
        }
        self.queues.remove_if(answer_topic, |_, q| q.is_empty());
    }

    /// Drop a timed-out slot and every orphan queued ahead of it.
    pub(crate) fn expire(&self, answer_topic: &str, id: u64) {
        if let Some(mut queue) = self.queues.get_mut(answer_topic) {
            if let Some(position) = queue.iter().position(|s| s.id == id) {
                let mut index = 0;
                queue.retain(|slot| {
                    let ahead = index <= position;
                    index += 1;
                    !ahead || (slot.id != id && matches!(slot.state, SlotState::Waiting(_)))
                });
            }
        }
        self.queues.remove_if(answer_topic, |_, q| q.is_empty());
    }

    /// Stop waiting on a slot but keep its place for a late answer.
    pub(crate) fn orphan(&self, answer_topic: &str, id: u64) {
        let until = Instant::now() + self.grace;
        if let Some(mut queue) = self.queues.get_mut(answer_topic) {
            if let Some(slot) = queue.iter_mut().find(|s| s.id == id) {
                slot.settle(Resolution::Cancelled, until);
            }
        }
    }

    /// Hand an answer to the oldest live slot of its topic.
    pub(crate) fn resolve(&self, answer_topic: &str, answer: Answer) -> Delivery {
        let now = Instant::now();
        let delivery = {
            let Some(mut queue) = self.queues.get_mut(answer_topic) else {
                return Delivery::Unsolicited;
            };
            loop {
                let Some(mut slot) = queue.pop_front() else {
                    break Delivery::Unsolicited;
                };
                match slot.state {
                    SlotState::Orphaned { .. } if slot.is_expired(now) => {}
                    SlotState::Orphaned { .. } => {
                        debug!(topic = answer_topic, status = answer.status, "late answer discarded");
                        break Delivery::Discarded;
                    }
                    SlotState::Waiting(_) => {
                        slot.settle(Resolution::Answer(answer), now);
                        break Delivery::Delivered;
                    }
                }
            }
        };
        self.queues.remove_if(answer_topic, |_, q| q.is_empty());
        delivery
    }

    /// Settle every slot, e.g. with `ConnectionLost` or on shutdown.
    pub(crate) fn fail_all(&self, resolution: &Resolution) {
        let now = Instant::now();
        for mut entry in self.queues.iter_mut() {
            for slot in entry.value_mut().iter_mut() {
                slot.settle(resolution.clone(), now);
            }
        }
        self.queues.clear();
    }

    /// Settle every slot targeting `device` with `DeviceRemoved`.
    pub(crate) fn fail_device(&self, device: &DeviceId) -> usize {
        let now = Instant::now();
        let mut failed = 0;
        for mut entry in self.queues.iter_mut() {
            entry.value_mut().retain_mut(|slot| {
                if slot.device.as_ref() != Some(device) {
                    return true;
                }
                if matches!(slot.state, SlotState::Waiting(_)) {
                    failed += 1;
                }
                slot.settle(Resolution::DeviceRemoved, now);
                false
            });
        }
        self.queues.retain(|_, q| !q.is_empty());
        failed
    }

    /// Drop orphans whose grace period has passed.
    pub(crate) fn purge_expired(&self) {
        let now = Instant::now();
        for mut entry in self.queues.iter_mut() {
            entry.value_mut().retain(|slot| !slot.is_expired(now));
        }
        self.queues.retain(|_, q| !q.is_empty());
    }

    /// Slots still awaited by a caller.
    #[cfg(test)]
    pub(crate) fn waiting(&self) -> usize {
        self.queues
            .iter()
            .map(|q| {
                q.iter()
                    .filter(|s| matches!(s.state, SlotState::Waiting(_)))
                    .count()
            })
            .sum()
    }
}

// ── Handles ──────────────────────────────────────────────────────────

/// Shared waiting logic of command and request handles.
struct Waiter {
    table: Arc<PendingTable>,
    answer_topic: String,
    id: u64,
    rx: oneshot::Receiver<Resolution>,
    deadline: Instant,
    settled: bool,
}

impl Waiter {
    /// `None` on timeout.
    async fn wait(&mut self) -> Option<Resolution> {
        let resolution = tokio::select! {
            biased;
            res = &mut self.rx => Some(res.unwrap_or(Resolution::Cancelled)),
            () = tokio::time::sleep_until(self.deadline) => None,
        };
        if resolution.is_none() {
            self.table.expire(&self.answer_topic, self.id);
        }
        self.settled = true;
        resolution
    }

    fn cancel(&mut self) {
        if !self.settled {
            self.table.orphan(&self.answer_topic, self.id);
            self.settled = true;
        }
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// A published command awaiting its answer.
///
/// Dropping the handle without awaiting [`outcome`](Self::outcome)
/// cancels it; a late answer is then discarded.
pub struct PendingCommand {
    device: DeviceId,
    waiter: Waiter,
}

impl PendingCommand {
    pub(crate) fn new(
        table: Arc<PendingTable>,
        device: DeviceId,
        answer_topic: String,
        id: u64,
        rx: oneshot::Receiver<Resolution>,
        deadline: Instant,
    ) -> Self {
        Self {
            device,
            waiter: Waiter {
                table,
                answer_topic,
                id,
                rx,
                deadline,
                settled: false,
            },
        }
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    /// When the command times out, counted from publish.
    pub fn deadline(&self) -> Instant {
        self.waiter.deadline
    }

    pub async fn outcome(mut self) -> CommandOutcome {
        match self.waiter.wait().await {
            Some(resolution) => CommandOutcome::from_resolution(resolution),
            None => CommandOutcome::TimedOut,
        }
    }

    pub fn cancel(mut self) {
        self.waiter.cancel();
    }
}

impl fmt::Debug for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCommand")
            .field("device", &self.device)
            .field("answer_topic", &self.waiter.answer_topic)
            .field("deadline", &self.waiter.deadline)
            .finish_non_exhaustive()
    }
}

/// A published ReCom request awaiting its answer.
pub struct PendingRequest {
    waiter: Waiter,
}

impl PendingRequest {
    pub(crate) fn new(
        table: Arc<PendingTable>,
        answer_topic: String,
        id: u64,
        rx: oneshot::Receiver<Resolution>,
        deadline: Instant,
    ) -> Self {
        Self {
            waiter: Waiter {
                table,
                answer_topic,
                id,
                rx,
                deadline,
                settled: false,
            },
        }
    }

    pub fn answer_topic(&self) -> &str {
        &self.waiter.answer_topic
    }

    pub async fn outcome(mut self) -> RequestOutcome {
        match self.waiter.wait().await {
            Some(resolution) => RequestOutcome::from_resolution(resolution),
            None => RequestOutcome::TimedOut,
        }
    }

    pub fn cancel(mut self) {
        self.waiter.cancel();
    }
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("answer_topic", &self.waiter.answer_topic)
            .field("deadline", &self.waiter.deadline)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TOPIC: &str = "EnOcean/G1/putAnswer/devices/0528C9BA/state";
    const OUTPUT: Option<(CommandClass, u8)> = Some((CommandClass::Output, 0));

    fn ok() -> Answer {
        Answer {
            status: 200,
            detail: None,
            data: serde_json::Value::Null,
        }
    }

    fn table() -> Arc<PendingTable> {
        Arc::new(PendingTable::new(Duration::from_secs(30)))
    }

    #[tokio::test]
    async fn answers_resolve_in_fifo_order() {
        let table = table();
        let (_, mut first) = table.register(TOPIC, None, None);
        let (_, mut second) = table.register(TOPIC, None, None);

        assert_eq!(table.resolve(TOPIC, ok()), Delivery::Delivered);
        assert!(matches!(first.try_recv().unwrap(), Resolution::Answer(_)));
        assert!(second.try_recv().is_err());
        assert_eq!(table.waiting(), 1);
    }

    #[tokio::test]
    async fn superseded_slot_swallows_its_late_answer() {
        let table = table();
        let (_, mut older) = table.register(TOPIC, None, OUTPUT);
        let (newer_id, mut newer) = table.register(TOPIC, None, OUTPUT);

        assert_eq!(table.supersede(TOPIC, newer_id), 1);
        assert!(matches!(older.try_recv().unwrap(), Resolution::Superseded));

        assert_eq!(table.resolve(TOPIC, ok()), Delivery::Discarded);
        assert!(newer.try_recv().is_err());
        assert_eq!(table.resolve(TOPIC, ok()), Delivery::Delivered);
        assert!(matches!(newer.try_recv().unwrap(), Resolution::Answer(_)));
    }

    #[tokio::test]
    async fn other_channels_are_not_superseded() {
        let table = table();
        let (_, mut ch0) = table.register(TOPIC, None, OUTPUT);
        let (id, _ch1) = table.register(TOPIC, None, Some((CommandClass::Output, 1)));
        assert_eq!(table.supersede(TOPIC, id), 0);
        assert!(ch0.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_orphans_are_skipped() {
        let table = table();
        let (orphan, _rx) = table.register(TOPIC, None, None);
        let (_, mut live) = table.register(TOPIC, None, None);
        table.orphan(TOPIC, orphan);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(table.resolve(TOPIC, ok()), Delivery::Delivered);
        assert!(matches!(live.try_recv().unwrap(), Resolution::Answer(_)));
        assert_eq!(table.resolve(TOPIC, ok()), Delivery::Unsolicited);
    }

    #[tokio::test]
    async fn expired_slot_takes_stale_orphans_with_it() {
        let table = table();
        let (cancelled, _c) = table.register(TOPIC, None, None);
        let (timed_out, _t) = table.register(TOPIC, None, None);
        let (_, mut next) = table.register(TOPIC, None, None);
        table.orphan(TOPIC, cancelled);

        table.expire(TOPIC, timed_out);
        assert_eq!(table.resolve(TOPIC, ok()), Delivery::Delivered);
        assert!(matches!(next.try_recv().unwrap(), Resolution::Answer(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_waiter_leaves_no_orphan() {
        let table = table();
        let (id, rx) = table.register(TOPIC, None, None);
        let mut waiter = Waiter {
            table: Arc::clone(&table),
            answer_topic: TOPIC.to_owned(),
            id,
            rx,
            deadline: Instant::now() + Duration::from_millis(500),
            settled: false,
        };
        assert!(waiter.wait().await.is_none());

        let (_, mut next) = table.register(TOPIC, None, None);
        assert_eq!(table.resolve(TOPIC, ok()), Delivery::Delivered);
        assert!(matches!(next.try_recv().unwrap(), Resolution::Answer(_)));
    }

    #[tokio::test]
    async fn device_removal_fails_only_that_device() {
        let table = table();
        let device = DeviceId::from("0528C9BA");
        let (_, mut gone) = table.register(TOPIC, Some(device.clone()), OUTPUT);
        let (_, mut other) = table.register("EnOcean/G1/putAnswer/devices/01843197/state", Some("01843197".into()), OUTPUT);

        assert_eq!(table.fail_device(&device), 1);
        assert!(matches!(gone.try_recv().unwrap(), Resolution::DeviceRemoved));
        assert!(other.try_recv().is_err());

        table.fail_all(&Resolution::ConnectionLost);
        assert!(matches!(other.try_recv().unwrap(), Resolution::ConnectionLost));
        assert_eq!(table.waiting(), 0);
    }
}
