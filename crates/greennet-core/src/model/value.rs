// ── Attribute values ──

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::profile::Unit;

/// A validated attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number { value: f64, unit: Option<Unit> },
    Choice(String),
    Flag(bool),
    /// The gateway's `notAvailable` sentinel.
    NotAvailable,
}

impl AttributeValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Choice(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Self::NotAvailable)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number {
                value,
                unit: Some(unit),
            } => write!(f, "{value} {unit}"),
            Self::Number { value, unit: None } => write!(f, "{value}"),
            Self::Choice(s) => f.write_str(s),
            Self::Flag(b) => write!(f, "{b}"),
            Self::NotAvailable => f.write_str("n/a"),
        }
    }
}

/// Severity of an active error/warning condition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let v = AttributeValue::Number {
            value: 21.5,
            unit: Some(Unit::Celsius),
        };
        assert_eq!(v.to_string(), "21.5 °C");
        assert_eq!(
            AttributeValue::Number {
                value: 75.0,
                unit: None
            }
            .to_string(),
            "75"
        );
        assert_eq!(AttributeValue::NotAvailable.to_string(), "n/a");
        assert_eq!("warning".parse::<Severity>().ok(), Some(Severity::Warning));
    }
}
