// ── Device model ──
//
// Concurrent registry of devices keyed by radio address. Each mutation
// holds the device's map entry for the duration of validate + merge, so
// updates to one device are serialized while other devices proceed in
// parallel. The snapshot is rebuilt after the entry guard is released,
// under the snapshot lock so concurrent rebuilds store in order.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use super::update::{self, AppliedChange};
use crate::error::Rejected;
use crate::model::{Device, DeviceId, Event};
use crate::profile::ProfileId;
use crate::stream::DeviceStream;

const EVENT_CHANNEL_SIZE: usize = 256;

/// Declared facts about a device from discovery.
///
/// `profile: None` updates metadata only and never reassigns.
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub profile: Option<ProfileId>,
    pub channels: u8,
    pub tilt: bool,
    pub eep: Option<String>,
    pub friendly_id: Option<String>,
    pub manufacturer: Option<String>,
    pub dbm: Option<i64>,
}

/// Result of [`DeviceModel::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Created,
    /// Profile changed; all stored values were cleared.
    Reassigned { previous: ProfileId },
    Updated,
}

/// In-memory device registry with change notification.
pub struct DeviceModel {
    devices: DashMap<DeviceId, Arc<Device>>,
    snapshot: watch::Sender<Arc<Vec<Arc<Device>>>>,
    events: broadcast::Sender<Arc<Event>>,
}

impl Default for DeviceModel {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceModel {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            devices: DashMap::new(),
            snapshot,
            events,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn device(&self, id: &str) -> Option<Arc<Device>> {
        self.devices.get(id).map(|r| Arc::clone(r.value()))
    }

    /// All devices sorted by id (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> DeviceStream {
        DeviceStream::new(self.snapshot.subscribe())
    }

    pub fn events(&self) -> broadcast::Receiver<Arc<Event>> {
        self.events.subscribe()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn ids(&self) -> Vec<DeviceId> {
        self.devices.iter().map(|r| r.key().clone()).collect()
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Create or update a device with a declared profile.
    pub fn upsert_device(&self, id: &DeviceId, profile: ProfileId, channel_count: u8) -> Upserted {
        self.upsert(DeviceInfo {
            id: id.clone(),
            profile: Some(profile),
            channels: channel_count,
            ..DeviceInfo::default()
        })
    }

    /// Create or update a device from discovery data.
    ///
    /// A declared profile different from the current one is a hard
    /// discontinuity: every stored value and condition is dropped.
    pub fn upsert(&self, info: DeviceInfo) -> Upserted {
        let mut events = Vec::new();

        let outcome = match self.devices.entry(info.id.clone()) {
            Entry::Vacant(slot) => {
                let profile = info.profile.unwrap_or(ProfileId::Unknown);
                let mut device = Device::new(info.id.clone(), profile, info.channels);
                device.profile_resolved = info.profile.is_some();
                apply_info(&mut device, &info);

                events.push(Event::DeviceAdded {
                    device: info.id.clone(),
                    profile,
                });
                if !device.profile_resolved {
                    events.push(Event::ProfileUnresolved {
                        device: info.id.clone(),
                    });
                }
                slot.insert(Arc::new(device));
                Upserted::Created
            }
            Entry::Occupied(mut slot) => {
                let device = Arc::make_mut(slot.get_mut());
                let mut outcome = Upserted::Updated;

                if let Some(profile) = info.profile {
                    if profile != device.profile {
                        let previous = device.profile;
                        device.clear_state();
                        device.profile = profile;
                        events.push(Event::ProfileReassigned {
                            device: info.id.clone(),
                            previous,
                            profile,
                        });
                        outcome = Upserted::Reassigned { previous };
                    }
                    device.profile_resolved = true;
                    device.resize_channels(info.channels);
                }
                apply_info(device, &info);
                outcome
            }
        };

        for event in events {
            self.emit(event);
        }
        self.rebuild_snapshot();
        outcome
    }

    /// Create a placeholder for a device seen before its profile is known.
    ///
    /// Returns `true` if the device was created.
    pub fn ensure_device(&self, id: &DeviceId) -> bool {
        if self.devices.contains_key(id.as_str()) {
            return false;
        }
        matches!(
            self.upsert(DeviceInfo {
                id: id.clone(),
                channels: 1,
                ..DeviceInfo::default()
            }),
            Upserted::Created
        )
    }

    /// Validate and store one inbound value.
    ///
    /// Rejected updates leave the device untouched. Invalid values emit
    /// [`Event::UpdateRejected`]; unknown keys are only logged.
    pub fn apply_update(
        &self,
        id: &DeviceId,
        channel: u8,
        key: &str,
        raw: &Value,
    ) -> Result<AppliedChange, Rejected> {
        let mut entry = self
            .devices
            .get_mut(id.as_str())
            .ok_or_else(|| Rejected::UnknownDevice(id.clone()))?;

        let validated = match update::validate(entry.value(), channel, key, raw) {
            Ok(v) => v,
            Err(rejected) => {
                drop(entry);
                match &rejected {
                    Rejected::InvalidValue { reason, .. } => self.emit(Event::UpdateRejected {
                        device: id.clone(),
                        channel,
                        key: key.to_owned(),
                        reason: reason.clone(),
                    }),
                    other => debug!(device = %id, channel, key, reason = %other, "update ignored"),
                }
                return Err(rejected);
            }
        };

        let device = Arc::make_mut(entry.value_mut());
        let change = update::merge(device, channel, key, validated, Utc::now());
        let applied = AppliedChange {
            device: id.clone(),
            channel,
            key: key.to_owned(),
            change,
        };
        if let Some(event) = applied.to_event() {
            self.emit(event);
        }
        drop(entry);

        self.rebuild_snapshot();
        Ok(applied)
    }

    /// Record radio metadata from a telegram.
    pub fn record_radio(&self, id: &DeviceId, friendly_id: Option<&str>, dbm: Option<i64>) {
        let Some(mut entry) = self.devices.get_mut(id.as_str()) else {
            return;
        };
        let device = Arc::make_mut(entry.value_mut());
        device.last_seen = Some(Utc::now());
        if dbm.is_some() {
            device.dbm = dbm;
        }
        if let Some(name) = friendly_id {
            device.friendly_id = Some(name.to_owned());
        }
        drop(entry);
        self.rebuild_snapshot();
    }

    /// Drop a device and all its channels.
    pub fn remove_device(&self, id: &DeviceId) -> Option<Arc<Device>> {
        let (_, removed) = self.devices.remove(id.as_str())?;
        self.emit(Event::DeviceRemoved { device: id.clone() });
        self.rebuild_snapshot();
        Some(removed)
    }

    /// Remove every device not in `keep`, returning the removed ids.
    pub fn retain_only(&self, keep: &HashSet<DeviceId>) -> Vec<DeviceId> {
        let stale: Vec<DeviceId> = self
            .devices
            .iter()
            .filter(|r| !keep.contains(r.key()))
            .map(|r| r.key().clone())
            .collect();
        stale
            .into_iter()
            .filter(|id| self.remove_device(id).is_some())
            .collect()
    }

    pub(crate) fn emit(&self, event: Event) {
        // No receivers is fine.
        let _ = self.events.send(Arc::new(event));
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn rebuild_snapshot(&self) {
        self.snapshot.send_modify(|snap| {
            let mut values: Vec<Arc<Device>> =
                self.devices.iter().map(|r| Arc::clone(r.value())).collect();
            values.sort_by(|a, b| a.id.cmp(&b.id));
            *snap = Arc::new(values);
        });
    }
}

fn apply_info(device: &mut Device, info: &DeviceInfo) {
    if info.profile.is_some() {
        device.tilt = info.tilt;
    }
    if let Some(ref eep) = info.eep {
        device.eep = Some(eep.clone());
    }
    if let Some(ref name) = info.friendly_id {
        device.friendly_id = Some(name.clone());
    }
    if let Some(ref manufacturer) = info.manufacturer {
        device.manufacturer = Some(manufacturer.clone());
    }
    if info.dbm.is_some() {
        device.dbm = info.dbm;
    }
}
