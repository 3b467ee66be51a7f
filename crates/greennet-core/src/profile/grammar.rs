// ── Value grammars ──
//
// Every key a profile accepts is described by one `KeySpec`. Raw JSON
// values from the gateway (or from callers building commands) are checked
// through `KeySpec::validate` and nowhere else.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

use greennet_api::payload::NOT_AVAILABLE;

use crate::model::AttributeValue;

/// Tolerance when checking that a value sits on a step boundary.
const STEP_EPSILON: f64 = 1e-6;

/// Severity vocabulary shared by every error/warning key.
pub const SEVERITY_VALUES: &[&str] = &["info", "warning", "error", "reset"];

/// Physical unit attached to numeric attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum Unit {
    #[serde(rename = "%")]
    #[strum(serialize = "%")]
    Percent,
    #[serde(rename = "°C")]
    #[strum(serialize = "°C")]
    Celsius,
    #[serde(rename = "W")]
    #[strum(serialize = "W")]
    Watt,
    #[serde(rename = "Wh")]
    #[strum(serialize = "Wh")]
    WattHour,
    #[serde(rename = "kWh")]
    #[strum(serialize = "kWh")]
    KilowattHour,
}

/// Group of outbound keys that address the same actuator function.
///
/// A newer command of the same class on the same channel supersedes an
/// older one still waiting for its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CommandClass {
    Output,
    Motion,
    Climate,
    Query,
}

/// Shape of the values accepted for a key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Grammar {
    /// Inclusive numeric range, optionally quantized to `step`.
    Range {
        min: f64,
        max: f64,
        step: Option<f64>,
        unit: Option<Unit>,
        /// Accept the `notAvailable` sentinel.
        not_available: bool,
        /// Literal words accepted besides numbers (cover `stop`).
        keywords: &'static [&'static str],
    },
    /// One of a fixed set of words.
    Choice(&'static [&'static str]),
    Flag,
    /// `info`, `warning`, `error`, or `reset`.
    Severity,
}

/// Role of a key inside a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Stored as the key's current value.
    State,
    /// Error/warning key: `reset` clears, anything else replaces.
    Condition,
    /// Addresses a channel, never stored.
    Routing,
}

/// One accepted key with its grammar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeySpec {
    pub key: &'static str,
    pub grammar: Grammar,
    pub kind: KeyKind,
    pub class: Option<CommandClass>,
}

impl KeySpec {
    pub const fn state(key: &'static str, grammar: Grammar) -> Self {
        Self {
            key,
            grammar,
            kind: KeyKind::State,
            class: None,
        }
    }

    pub const fn condition(key: &'static str) -> Self {
        Self {
            key,
            grammar: Grammar::Severity,
            kind: KeyKind::Condition,
            class: None,
        }
    }

    pub const fn routing(key: &'static str, grammar: Grammar) -> Self {
        Self {
            key,
            grammar,
            kind: KeyKind::Routing,
            class: None,
        }
    }

    pub const fn command(key: &'static str, grammar: Grammar, class: CommandClass) -> Self {
        Self {
            key,
            grammar,
            kind: KeyKind::State,
            class: Some(class),
        }
    }

    pub fn is_condition(&self) -> bool {
        self.kind == KeyKind::Condition
    }

    pub fn is_routing(&self) -> bool {
        self.kind == KeyKind::Routing
    }

    /// Validate a raw value, returning the typed value or a reason.
    pub fn validate(&self, raw: &Value) -> Result<AttributeValue, String> {
        self.grammar.validate(raw)
    }
}

impl Grammar {
    pub fn validate(&self, raw: &Value) -> Result<AttributeValue, String> {
        match *self {
            Self::Range {
                min,
                max,
                step,
                unit,
                not_available,
                keywords,
            } => {
                if let Some(text) = raw.as_str() {
                    if not_available && text == NOT_AVAILABLE {
                        return Ok(AttributeValue::NotAvailable);
                    }
                    if let Some(word) = keywords.iter().find(|k| **k == text) {
                        return Ok(AttributeValue::Choice((*word).to_owned()));
                    }
                }
                let value = number_of(raw).ok_or_else(|| format!("expected a number, got {raw}"))?;
                if value < min || value > max {
                    return Err(format!("{value} is outside {min}..{max}"));
                }
                if let Some(step) = step {
                    let steps = (value - min) / step;
                    if (steps - steps.round()).abs() > STEP_EPSILON {
                        return Err(format!("{value} is not a multiple of {step}"));
                    }
                }
                Ok(AttributeValue::Number { value, unit })
            }
            Self::Choice(options) => choice(raw, options),
            Self::Severity => choice(raw, SEVERITY_VALUES),
            Self::Flag => match raw {
                Value::Bool(b) => Ok(AttributeValue::Flag(*b)),
                Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(AttributeValue::Flag(true)),
                Value::String(s) if s.eq_ignore_ascii_case("false") => {
                    Ok(AttributeValue::Flag(false))
                }
                other => Err(format!("expected true or false, got {other}")),
            },
        }
    }
}

fn choice(raw: &Value, options: &[&str]) -> Result<AttributeValue, String> {
    let text = raw
        .as_str()
        .ok_or_else(|| format!("expected text, got {raw}"))?;
    if options.contains(&text) {
        Ok(AttributeValue::Choice(text.to_owned()))
    } else {
        Err(format!("'{text}' is not one of {}", options.join(", ")))
    }
}

/// Numeric value of a JSON number or numeric text.
pub(crate) fn number_of(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    const SETPOINT: Grammar = Grammar::Range {
        min: 0.0,
        max: 40.0,
        step: Some(0.5),
        unit: Some(Unit::Celsius),
        not_available: true,
        keywords: &[],
    };

    #[test]
    fn range_accepts_numbers_and_numeric_text() {
        assert_eq!(
            SETPOINT.validate(&json!(21.5)).unwrap(),
            AttributeValue::Number {
                value: 21.5,
                unit: Some(Unit::Celsius)
            }
        );
        assert!(SETPOINT.validate(&json!("22")).is_ok());
        assert_eq!(
            SETPOINT.validate(&json!("notAvailable")).unwrap(),
            AttributeValue::NotAvailable
        );
    }

    #[test]
    fn range_rejects_out_of_range_and_off_step() {
        assert!(SETPOINT.validate(&json!(40.5)).is_err());
        assert!(SETPOINT.validate(&json!(-1)).is_err());
        assert!(SETPOINT.validate(&json!(21.3)).is_err());
        assert!(SETPOINT.validate(&json!("warm")).is_err());
        assert!(SETPOINT.validate(&json!(true)).is_err());
    }

    #[test]
    fn fine_step_tolerates_float_noise() {
        let grammar = Grammar::Range {
            min: 0.0,
            max: 40.0,
            step: Some(0.1),
            unit: None,
            not_available: false,
            keywords: &[],
        };
        assert!(grammar.validate(&json!(21.3)).is_ok());
        assert!(grammar.validate(&json!(21.35)).is_err());
        assert!(grammar.validate(&json!("notAvailable")).is_err());
    }

    #[test]
    fn choice_flag_and_severity() {
        let on_off = Grammar::Choice(&["on", "off"]);
        assert_eq!(
            on_off.validate(&json!("on")).unwrap(),
            AttributeValue::Choice("on".into())
        );
        assert!(on_off.validate(&json!("ON")).is_err());
        assert!(on_off.validate(&json!(1)).is_err());

        assert_eq!(
            Grammar::Flag.validate(&json!("False")).unwrap(),
            AttributeValue::Flag(false)
        );
        assert!(Grammar::Flag.validate(&json!("maybe")).is_err());

        assert!(Grammar::Severity.validate(&json!("reset")).is_ok());
        assert!(Grammar::Severity.validate(&json!("critical")).is_err());
    }
}
