// ── Fragment assembler ──
//
// Gateways may publish one message per leaf (`.../functions/0/key`).
// Fragments for the same stream and device accumulate until no new one
// arrived for the quiet period, then the whole object is decoded once.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use greennet_api::payload::FragmentTree;

use crate::model::DeviceId;

/// Stream a fragment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum StreamKind {
    Telegram,
    Delta,
    Descriptor,
}

pub(crate) type FragmentKey = (StreamKind, DeviceId);

/// A reassembled message.
#[derive(Debug)]
pub(crate) struct Assembled {
    pub key: FragmentKey,
    /// Topic without the fragment sub-path.
    pub topic: String,
    pub value: Value,
    pub fragments: usize,
}

struct Partial {
    tree: FragmentTree,
    topic: String,
    deadline: Instant,
    seq: u64,
}

pub(crate) struct FragmentAssembler {
    quiet: Duration,
    partials: HashMap<FragmentKey, Partial>,
    seq: u64,
}

impl FragmentAssembler {
    pub(crate) fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            partials: HashMap::new(),
            seq: 0,
        }
    }

    /// Record a fragment; restarts the key's quiet period.
    pub(crate) fn push(&mut self, key: FragmentKey, topic: &str, path: &[String], raw: &[u8]) {
        let deadline = Instant::now() + self.quiet;
        let seq = self.seq;
        let partial = self.partials.entry(key).or_insert_with(|| Partial {
            tree: FragmentTree::new(),
            topic: topic.to_owned(),
            deadline,
            seq,
        });
        partial.tree.insert(path, raw);
        partial.deadline = deadline;
        self.seq += 1;
    }

    /// Earliest quiet-period expiry.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.partials.values().map(|p| p.deadline).min()
    }

    /// Take every partial whose quiet period is over, oldest first.
    pub(crate) fn take_due(&mut self, now: Instant) -> Vec<Assembled> {
        let due: Vec<FragmentKey> = self
            .partials
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(k, _)| k.clone())
            .collect();
        let mut out: Vec<(u64, Assembled)> = due
            .into_iter()
            .filter_map(|key| self.take_with_seq(&key))
            .collect();
        out.sort_by_key(|(seq, _)| *seq);
        out.into_iter().map(|(_, a)| a).collect()
    }

    /// Take a partial early, before a whole message for the same key.
    pub(crate) fn take(&mut self, key: &FragmentKey) -> Option<Assembled> {
        self.take_with_seq(key).map(|(_, a)| a)
    }

    pub(crate) fn clear(&mut self) {
        self.partials.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.partials.len()
    }

    fn take_with_seq(&mut self, key: &FragmentKey) -> Option<(u64, Assembled)> {
        let (key, partial) = self.partials.remove_entry(key)?;
        let fragments = partial.tree.len();
        Some((
            partial.seq,
            Assembled {
                key,
                topic: partial.topic,
                value: partial.tree.finish(),
                fragments,
            },
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn path(p: &str) -> Vec<String> {
        p.split('/').map(str::to_owned).collect()
    }

    fn key(id: &str) -> FragmentKey {
        (StreamKind::Telegram, DeviceId::from(id))
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_period_restarts_on_each_fragment() {
        let mut assembler = FragmentAssembler::new(Duration::from_millis(75));
        let topic = "EnOcean/G1/stream/telegram/0528C9BA/from";

        assembler.push(key("0528C9BA"), topic, &path("functions/0/key"), b"switch");
        tokio::time::advance(Duration::from_millis(50)).await;
        assembler.push(key("0528C9BA"), topic, &path("functions/0/value"), b"on");
        tokio::time::advance(Duration::from_millis(50)).await;

        assert!(assembler.take_due(Instant::now()).is_empty());
        tokio::time::advance(Duration::from_millis(25)).await;

        let done = assembler.take_due(Instant::now());
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].fragments, 2);
        assert_eq!(done[0].topic, topic);
        assert_eq!(
            done[0].value,
            json!({"functions": [{"key": "switch", "value": "on"}]})
        );
        assert_eq!(assembler.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn due_partials_come_out_in_arrival_order() {
        let mut assembler = FragmentAssembler::new(Duration::from_millis(75));
        assembler.push(key("B"), "b", &path("x"), b"1");
        assembler.push(key("A"), "a", &path("x"), b"1");
        tokio::time::advance(Duration::from_millis(80)).await;

        let order: Vec<_> = assembler
            .take_due(Instant::now())
            .into_iter()
            .map(|a| a.topic)
            .collect();
        assert_eq!(order, ["b", "a"]);
    }

    #[test]
    fn early_take_and_clear() {
        let mut assembler = FragmentAssembler::new(Duration::from_secs(1));
        assembler.push(key("A"), "a", &path("x"), b"1");
        assembler.push(key("B"), "b", &path("x"), b"1");

        assert!(assembler.take(&key("A")).is_some());
        assert!(assembler.take(&key("A")).is_none());
        assert!(assembler.next_deadline().is_some());

        assembler.clear();
        assert!(assembler.next_deadline().is_none());
    }
}
