// ── Device domain type ──

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device_id::DeviceId;
use super::value::{AttributeValue, Severity};
use crate::profile::ProfileId;

/// Current value of one key on one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub value: AttributeValue,
    pub updated_at: DateTime<Utc>,
}

/// An active error/warning condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub severity: Severity,
    /// When the current severity was first reported.
    pub since: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One addressable output or sensor group of a device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub index: u8,
    pub attributes: BTreeMap<String, Attribute>,
    pub conditions: BTreeMap<String, Condition>,
}

impl Channel {
    pub fn new(index: u8) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    pub fn clear(&mut self) {
        self.attributes.clear();
        self.conditions.clear();
    }
}

/// A device known to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub profile: ProfileId,
    /// `false` while the profile is only a placeholder for a device
    /// first seen through a telegram.
    pub profile_resolved: bool,
    pub eep: Option<String>,
    /// Cover with a controllable slat angle.
    pub tilt: bool,
    pub friendly_id: Option<String>,
    pub manufacturer: Option<String>,
    pub dbm: Option<i64>,
    pub channels: Vec<Channel>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl Device {
    /// A device with `channel_count` empty channels (at least one).
    pub fn new(id: DeviceId, profile: ProfileId, channel_count: u8) -> Self {
        let mut device = Self {
            id,
            profile,
            profile_resolved: profile != ProfileId::Unknown,
            eep: None,
            tilt: false,
            friendly_id: None,
            manufacturer: None,
            dbm: None,
            channels: Vec::new(),
            first_seen: Utc::now(),
            last_seen: None,
        };
        device.resize_channels(channel_count);
        device
    }

    /// Friendly name when the gateway has one, otherwise the id.
    pub fn display_name(&self) -> &str {
        self.friendly_id.as_deref().unwrap_or(self.id.as_str())
    }

    pub fn channel_count(&self) -> u8 {
        u8::try_from(self.channels.len()).unwrap_or(u8::MAX)
    }

    pub fn channel(&self, index: u8) -> Option<&Channel> {
        self.channels.get(usize::from(index))
    }

    pub fn attribute(&self, channel: u8, key: &str) -> Option<&Attribute> {
        self.channel(channel)?.attributes.get(key)
    }

    pub fn value(&self, channel: u8, key: &str) -> Option<&AttributeValue> {
        self.attribute(channel, key).map(|a| &a.value)
    }

    pub fn condition(&self, channel: u8, key: &str) -> Option<&Condition> {
        self.channel(channel)?.conditions.get(key)
    }

    /// Every active condition as `(channel, key, condition)`.
    pub fn active_conditions(&self) -> impl Iterator<Item = (u8, &str, &Condition)> {
        self.channels.iter().flat_map(|ch| {
            ch.conditions
                .iter()
                .map(move |(key, cond)| (ch.index, key.as_str(), cond))
        })
    }

    pub fn has_conditions(&self) -> bool {
        self.channels.iter().any(|ch| !ch.conditions.is_empty())
    }

    /// Drop every stored value and condition.
    pub fn clear_state(&mut self) {
        for channel in &mut self.channels {
            channel.clear();
        }
    }

    pub(crate) fn resize_channels(&mut self, count: u8) {
        let count = count.max(1);
        self.channels.truncate(usize::from(count));
        while self.channels.len() < usize::from(count) {
            let index = self.channel_count();
            self.channels.push(Channel::new(index));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_indexed_and_resizable() {
        let mut device = Device::new("0528C9BA".into(), ProfileId::SwitchMultiChannel, 4);
        assert_eq!(device.channel_count(), 4);
        assert_eq!(device.channel(3).unwrap().index, 3);

        device.resize_channels(0);
        assert_eq!(device.channel_count(), 1);
        assert_eq!(device.display_name(), "0528C9BA");
    }

    #[test]
    fn unknown_profile_is_unresolved() {
        let device = Device::new("01843197".into(), ProfileId::Unknown, 1);
        assert!(!device.profile_resolved);
        assert!(!device.has_conditions());
    }
}
