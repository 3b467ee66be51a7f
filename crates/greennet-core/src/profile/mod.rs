// ── Profile registry ──
//
// Immutable catalog of device profiles: for each profile, the keys it
// reports (inbound) and the keys it accepts in commands (outbound), each
// with a value grammar. EEP codes from discovery map onto a profile plus
// a channel count.

mod catalog;
pub mod grammar;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

pub use grammar::{CommandClass, Grammar, KeyKind, KeySpec, SEVERITY_VALUES, Unit};

/// Supported device profiles.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
pub enum ProfileId {
    Switch1Ch,
    SwitchMultiChannel,
    Dimmer,
    Cover,
    HeatAreaValve,
    HeatAreaCosiTherm,
    HeatAreaElectro,
    /// No catalog entry; values are stored best-effort.
    Unknown,
}

impl ProfileId {
    pub fn is_heat_area(self) -> bool {
        matches!(
            self,
            Self::HeatAreaValve | Self::HeatAreaCosiTherm | Self::HeatAreaElectro
        )
    }
}

/// Key grammars of one profile.
#[derive(Debug)]
pub struct Profile {
    pub id: ProfileId,
    pub name: &'static str,
    pub inbound: &'static [KeySpec],
    pub outbound: &'static [KeySpec],
}

impl Profile {
    pub fn inbound_key(&self, key: &str) -> Option<&'static KeySpec> {
        self.inbound.iter().find(|spec| spec.key == key)
    }

    pub fn outbound_key(&self, key: &str) -> Option<&'static KeySpec> {
        self.outbound.iter().find(|spec| spec.key == key)
    }

    /// Error/warning keys reported by this profile.
    pub fn condition_keys(&self) -> impl Iterator<Item = &'static str> {
        self.inbound
            .iter()
            .filter(|spec| spec.is_condition())
            .map(|spec| spec.key)
    }
}

/// Profile lookup. `Unknown` has no entry.
pub fn lookup(id: ProfileId) -> Option<&'static Profile> {
    catalog::PROFILES.iter().find(|p| p.id == id)
}

/// Profile and hardware traits implied by an EEP code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EepInfo {
    pub profile: ProfileId,
    pub channels: u8,
    /// Cover with a controllable slat angle.
    pub tilt: bool,
}

impl EepInfo {
    pub const UNKNOWN: Self = Self {
        profile: ProfileId::Unknown,
        channels: 1,
        tilt: false,
    };
}

/// Map an EEP code (`D2-01-12`, case-insensitive) to its profile.
pub fn eep_info(eep: &str) -> EepInfo {
    let wanted = eep.trim();
    catalog::EEPS
        .iter()
        .find(|(code, ..)| code.eq_ignore_ascii_case(wanted))
        .map_or(EepInfo::UNKNOWN, |&(_, profile, channels, tilt)| EepInfo {
            profile,
            channels,
            tilt,
        })
}

/// EEP codes known to the catalog, with their profile.
pub fn known_eeps() -> impl Iterator<Item = (&'static str, ProfileId)> {
    catalog::EEPS.iter().map(|&(code, profile, ..)| (code, profile))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn every_profile_but_unknown_has_an_entry() {
        for id in ProfileId::iter() {
            assert_eq!(lookup(id).is_some(), id != ProfileId::Unknown, "{id}");
        }
    }

    #[test]
    fn eep_mapping() {
        assert_eq!(eep_info("D2-01-12").profile, ProfileId::Dimmer);
        assert_eq!(eep_info("d2-01-12").channels, 2);
        assert_eq!(eep_info("D2-01-0E").channels, 8);
        assert!(eep_info("D2-05-00").tilt);
        assert!(!eep_info("D2-05-01").tilt);
        assert_eq!(eep_info("F6-02-01"), EepInfo::UNKNOWN);
    }

    #[test]
    fn heat_area_variants_differ() {
        let valve = lookup(ProfileId::HeatAreaValve).unwrap();
        let cosi = lookup(ProfileId::HeatAreaCosiTherm).unwrap();

        assert!(valve.inbound_key("feedTemperature").is_some());
        assert!(cosi.inbound_key("feedTemperature").is_none());
        assert!(cosi.outbound_key("thermalMode").is_some());
        assert!(valve.outbound_key("thermalMode").is_none());

        let conditions: Vec<_> = cosi.condition_keys().collect();
        assert_eq!(
            conditions,
            ["actuatorNotResponding", "missingTemperature", "circuitInUse"]
        );
    }

    #[test]
    fn command_classes() {
        let dimmer = lookup(ProfileId::Dimmer).unwrap();
        assert_eq!(
            dimmer.outbound_key("dimValue").unwrap().class,
            Some(CommandClass::Output)
        );
        assert!(dimmer.outbound_key("channel").unwrap().is_routing());

        let cover = lookup(ProfileId::Cover).unwrap();
        assert_eq!(
            cover.outbound_key("angle").unwrap().class,
            Some(CommandClass::Motion)
        );
    }
}
