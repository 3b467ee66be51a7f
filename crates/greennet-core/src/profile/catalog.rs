// ── Static profile catalog ──

use super::grammar::{CommandClass, Grammar, KeySpec, Unit};
use super::{Profile, ProfileId};

const ON_OFF: &[&str] = &["on", "off"];
const HEATER_MODES: &[&str] = &["heating", "on", "off", "autoOff", "configIncomplete", "error"];
const HEATER_MODES_SETTABLE: &[&str] = &["heating", "on", "off", "autoOff"];
const THERMAL_MODES: &[&str] = &["heating", "cooling"];
const QUERIES: &[&str] = &["status"];

const PERCENT: Grammar = Grammar::Range {
    min: 0.0,
    max: 100.0,
    step: Some(1.0),
    unit: Some(Unit::Percent),
    not_available: false,
    keywords: &[],
};

const POSITION_COMMAND: Grammar = Grammar::Range {
    min: 0.0,
    max: 100.0,
    step: Some(1.0),
    unit: Some(Unit::Percent),
    not_available: false,
    keywords: &["stop"],
};

const HUMIDITY: Grammar = Grammar::Range {
    min: 0.0,
    max: 100.0,
    step: None,
    unit: Some(Unit::Percent),
    not_available: true,
    keywords: &[],
};

const TEMPERATURE: Grammar = Grammar::Range {
    min: -40.0,
    max: 80.0,
    step: None,
    unit: Some(Unit::Celsius),
    not_available: true,
    keywords: &[],
};

const CHANNEL: Grammar = Grammar::Range {
    min: 0.0,
    max: 7.0,
    step: Some(1.0),
    unit: None,
    not_available: false,
    keywords: &[],
};

const fn non_negative(unit: Unit) -> Grammar {
    Grammar::Range {
        min: 0.0,
        max: f64::INFINITY,
        step: None,
        unit: Some(unit),
        not_available: false,
        keywords: &[],
    }
}

const fn setpoint(step: f64) -> Grammar {
    Grammar::Range {
        min: 0.0,
        max: 40.0,
        step: Some(step),
        unit: Some(Unit::Celsius),
        not_available: true,
        keywords: &[],
    }
}

// ── Switches and dimmers ────────────────────────────────────────────

const SWITCH_INBOUND: &[KeySpec] = &[
    KeySpec::state("switch", Grammar::Choice(ON_OFF)),
    KeySpec::state("localControl", Grammar::Choice(ON_OFF)),
    KeySpec::state("energy", non_negative(Unit::WattHour)),
    KeySpec::state("power", non_negative(Unit::Watt)),
    KeySpec::routing("channel", CHANNEL),
];

const SWITCH_OUTBOUND: &[KeySpec] = &[
    KeySpec::command("switch", Grammar::Choice(ON_OFF), CommandClass::Output),
    KeySpec::routing("channel", CHANNEL),
];

const DIMMER_INBOUND: &[KeySpec] = &[
    KeySpec::state("switch", Grammar::Choice(ON_OFF)),
    KeySpec::state("dimValue", PERCENT),
    KeySpec::state("localControl", Grammar::Choice(ON_OFF)),
    KeySpec::state("energy", non_negative(Unit::WattHour)),
    KeySpec::state("power", non_negative(Unit::Watt)),
    KeySpec::routing("channel", CHANNEL),
];

const DIMMER_OUTBOUND: &[KeySpec] = &[
    KeySpec::command("switch", Grammar::Choice(ON_OFF), CommandClass::Output),
    KeySpec::command("dimValue", PERCENT, CommandClass::Output),
    KeySpec::routing("channel", CHANNEL),
];

// ── Covers ──────────────────────────────────────────────────────────

const COVER_INBOUND: &[KeySpec] = &[
    KeySpec::state("position", PERCENT),
    KeySpec::state("angle", PERCENT),
    KeySpec::routing("channel", CHANNEL),
];

const COVER_OUTBOUND: &[KeySpec] = &[
    KeySpec::command("position", POSITION_COMMAND, CommandClass::Motion),
    KeySpec::command("angle", PERCENT, CommandClass::Motion),
    KeySpec::routing("channel", CHANNEL),
];

// ── Heat areas ──────────────────────────────────────────────────────

const VALVE_INBOUND: &[KeySpec] = &[
    KeySpec::state("temperature", TEMPERATURE),
    KeySpec::state("temperatureSetpoint", setpoint(0.5)),
    KeySpec::state("heaterMode", Grammar::Choice(HEATER_MODES)),
    KeySpec::state("humidity", HUMIDITY),
    KeySpec::state("windowOpen", Grammar::Flag),
    KeySpec::state("summerMode", Grammar::Flag),
    KeySpec::state("feedTemperature", TEMPERATURE),
    KeySpec::condition("actuatorNotResponding"),
    KeySpec::condition("missingTemperature"),
    KeySpec::condition("actuatorLowBattery"),
    KeySpec::condition("actuatorDeactivated"),
    KeySpec::routing("channel", CHANNEL),
];

const VALVE_OUTBOUND: &[KeySpec] = &[
    KeySpec::command("temperatureSetpoint", setpoint(0.5), CommandClass::Climate),
    KeySpec::command("heaterMode", Grammar::Choice(HEATER_MODES_SETTABLE), CommandClass::Climate),
    KeySpec::command("query", Grammar::Choice(QUERIES), CommandClass::Query),
    KeySpec::routing("channel", CHANNEL),
];

const COSITHERM_INBOUND: &[KeySpec] = &[
    KeySpec::state("temperature", TEMPERATURE),
    KeySpec::state("temperatureSetpoint", setpoint(0.1)),
    KeySpec::state("heaterMode", Grammar::Choice(HEATER_MODES)),
    KeySpec::state("humidity", HUMIDITY),
    KeySpec::state("windowOpen", Grammar::Flag),
    KeySpec::state("summerMode", Grammar::Flag),
    KeySpec::state("thermalMode", Grammar::Choice(THERMAL_MODES)),
    KeySpec::condition("actuatorNotResponding"),
    KeySpec::condition("missingTemperature"),
    KeySpec::condition("circuitInUse"),
    KeySpec::routing("channel", CHANNEL),
];

const COSITHERM_OUTBOUND: &[KeySpec] = &[
    KeySpec::command("temperatureSetpoint", setpoint(0.1), CommandClass::Climate),
    KeySpec::command("heaterMode", Grammar::Choice(HEATER_MODES_SETTABLE), CommandClass::Climate),
    KeySpec::command("thermalMode", Grammar::Choice(THERMAL_MODES), CommandClass::Climate),
    KeySpec::command("query", Grammar::Choice(QUERIES), CommandClass::Query),
    KeySpec::routing("channel", CHANNEL),
];

const ELECTRO_INBOUND: &[KeySpec] = &[
    KeySpec::state("temperature", TEMPERATURE),
    KeySpec::state("temperatureSetpoint", setpoint(0.1)),
    KeySpec::state("heaterMode", Grammar::Choice(HEATER_MODES)),
    KeySpec::state("humidity", HUMIDITY),
    KeySpec::state("windowOpen", Grammar::Flag),
    KeySpec::state("summerMode", Grammar::Flag),
    KeySpec::state("energyConsumption", non_negative(Unit::KilowattHour)),
    KeySpec::condition("actuatorNotResponding"),
    KeySpec::condition("missingTemperature"),
    KeySpec::routing("channel", CHANNEL),
];

const ELECTRO_OUTBOUND: &[KeySpec] = &[
    KeySpec::command("temperatureSetpoint", setpoint(0.1), CommandClass::Climate),
    KeySpec::command("heaterMode", Grammar::Choice(HEATER_MODES_SETTABLE), CommandClass::Climate),
    KeySpec::command("query", Grammar::Choice(QUERIES), CommandClass::Query),
    KeySpec::routing("channel", CHANNEL),
];

// ── Profiles ────────────────────────────────────────────────────────

pub(super) static PROFILES: &[Profile] = &[
    Profile {
        id: ProfileId::Switch1Ch,
        name: "Switch, 1 channel",
        inbound: SWITCH_INBOUND,
        outbound: SWITCH_OUTBOUND,
    },
    Profile {
        id: ProfileId::SwitchMultiChannel,
        name: "Switch, multi-channel",
        inbound: SWITCH_INBOUND,
        outbound: SWITCH_OUTBOUND,
    },
    Profile {
        id: ProfileId::Dimmer,
        name: "Dimmer",
        inbound: DIMMER_INBOUND,
        outbound: DIMMER_OUTBOUND,
    },
    Profile {
        id: ProfileId::Cover,
        name: "Cover (position and tilt)",
        inbound: COVER_INBOUND,
        outbound: COVER_OUTBOUND,
    },
    Profile {
        id: ProfileId::HeatAreaValve,
        name: "Heat area, valve",
        inbound: VALVE_INBOUND,
        outbound: VALVE_OUTBOUND,
    },
    Profile {
        id: ProfileId::HeatAreaCosiTherm,
        name: "Heat area, CosiTherm",
        inbound: COSITHERM_INBOUND,
        outbound: COSITHERM_OUTBOUND,
    },
    Profile {
        id: ProfileId::HeatAreaElectro,
        name: "Heat area, electro",
        inbound: ELECTRO_INBOUND,
        outbound: ELECTRO_OUTBOUND,
    },
];

/// `(eep, profile, channels, tilt)`.
pub(super) static EEPS: &[(&str, ProfileId, u8, bool)] = &[
    ("D2-01-00", ProfileId::Switch1Ch, 1, false),
    ("D2-01-01", ProfileId::Switch1Ch, 1, false),
    ("D2-01-0C", ProfileId::Switch1Ch, 1, false),
    ("A5-38-09", ProfileId::Switch1Ch, 1, false),
    ("D2-01-04", ProfileId::SwitchMultiChannel, 2, false),
    ("D2-01-05", ProfileId::SwitchMultiChannel, 2, false),
    ("D2-01-08", ProfileId::SwitchMultiChannel, 4, false),
    ("D2-01-09", ProfileId::SwitchMultiChannel, 4, false),
    ("D2-01-0D", ProfileId::SwitchMultiChannel, 8, false),
    ("D2-01-0E", ProfileId::SwitchMultiChannel, 8, false),
    ("D2-01-11", ProfileId::SwitchMultiChannel, 2, false),
    ("D2-01-02", ProfileId::Dimmer, 1, false),
    ("D2-01-03", ProfileId::Dimmer, 1, false),
    ("D2-01-06", ProfileId::Dimmer, 2, false),
    ("D2-01-07", ProfileId::Dimmer, 2, false),
    ("D2-01-0A", ProfileId::Dimmer, 4, false),
    ("D2-01-0B", ProfileId::Dimmer, 4, false),
    ("D2-01-0F", ProfileId::Dimmer, 8, false),
    ("D2-01-10", ProfileId::Dimmer, 8, false),
    ("D2-01-12", ProfileId::Dimmer, 2, false),
    ("A5-38-08", ProfileId::Dimmer, 1, false),
    ("D2-05-00", ProfileId::Cover, 1, true),
    ("D2-05-01", ProfileId::Cover, 1, false),
    ("D2-05-02", ProfileId::Cover, 1, true),
    ("D1-4B-05", ProfileId::HeatAreaValve, 1, false),
    ("D1-4B-06", ProfileId::HeatAreaCosiTherm, 1, false),
    ("D1-4B-07", ProfileId::HeatAreaElectro, 1, false),
];
