// ── Filter predicates for device streams ──

use std::sync::Arc;

use crate::model::Device;
use crate::profile::ProfileId;

/// Filter predicate for device snapshots.
pub enum DeviceFilter {
    All,
    ByProfile(ProfileId),
    /// Devices still waiting for a declared profile.
    Unresolved,
    /// Devices with at least one active error/warning condition.
    WithConditions,
    Custom(Box<dyn Fn(&Device) -> bool + Send + Sync>),
}

impl DeviceFilter {
    pub fn matches(&self, device: &Device) -> bool {
        match self {
            Self::All => true,
            Self::ByProfile(p) => device.profile == *p,
            Self::Unresolved => !device.profile_resolved,
            Self::WithConditions => device.has_conditions(),
            Self::Custom(f) => f(device),
        }
    }

    pub fn apply(&self, devices: &[Arc<Device>]) -> Vec<Arc<Device>> {
        devices
            .iter()
            .filter(|d| self.matches(d))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeviceId;

    #[test]
    fn filters() {
        let dimmer = Arc::new(Device::new(DeviceId::from("A"), ProfileId::Dimmer, 1));
        let unknown = Arc::new(Device::new(DeviceId::from("B"), ProfileId::Unknown, 1));
        let all = vec![dimmer, unknown];

        assert_eq!(DeviceFilter::All.apply(&all).len(), 2);
        assert_eq!(DeviceFilter::ByProfile(ProfileId::Dimmer).apply(&all).len(), 1);
        assert_eq!(DeviceFilter::Unresolved.apply(&all)[0].id.as_str(), "B");
        assert!(DeviceFilter::WithConditions.apply(&all).is_empty());

        let custom = DeviceFilter::Custom(Box::new(|d| d.id.as_str() == "A"));
        assert_eq!(custom.apply(&all).len(), 1);
    }
}
