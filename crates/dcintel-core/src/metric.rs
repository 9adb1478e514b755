//! Value-or-unavailable numbers.
//!
//! Every numeric quantity that leaves the normalizer is a [`Metric`]. A source
//! that did not report a quantity yields `Metric::Unavailable`, never zero.
//! On the wire a metric is either a JSON number or the string `"unavailable"`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Marker string used for unavailable metrics in serialized output.
pub const UNAVAILABLE: &str = "unavailable";

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Metric {
    Value(f64),
    #[default]
    Unavailable,
}

impl Metric {
    /// Wrap a finite value; NaN and infinities become unavailable.
    pub fn from_finite(v: f64) -> Self {
        if v.is_finite() {
            Metric::Value(v)
        } else {
            Metric::Unavailable
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Metric::Value(v) => Some(*v),
            Metric::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Metric::Value(_))
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Metric {
        match self {
            Metric::Value(v) => Metric::from_finite(f(v)),
            Metric::Unavailable => Metric::Unavailable,
        }
    }
}

impl From<Option<f64>> for Metric {
    fn from(v: Option<f64>) -> Self {
        v.map(Metric::from_finite).unwrap_or(Metric::Unavailable)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Value(v) => write!(f, "{v:.2}"),
            Metric::Unavailable => f.write_str(UNAVAILABLE),
        }
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Metric::Value(v) => serializer.serialize_f64(*v),
            Metric::Unavailable => serializer.serialize_str(UNAVAILABLE),
        }
    }
}

impl<'de> Deserialize<'de> for Metric {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Number(f64),
            Text(String),
        }

        match Wire::deserialize(deserializer)? {
            Wire::Number(v) => Ok(Metric::from_finite(v)),
            Wire::Text(s) if s == UNAVAILABLE => Ok(Metric::Unavailable),
            Wire::Text(s) => Err(serde::de::Error::custom(format!(
                "expected a number or \"{UNAVAILABLE}\", got \"{s}\""
            ))),
        }
    }
}
