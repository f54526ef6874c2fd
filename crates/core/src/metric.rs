//! Null-safe metric values shared by every layer of the engine.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;

const INSUFFICIENT_DATA: &str = "insufficient_data";

/// Stored fraction to displayed percent. Applied once, where a stored ratio
/// becomes a derived column.
pub fn to_percent(fraction: f64) -> f64 {
    fraction * 100.0
}

/// A numeric metric that may have no meaningful value.
///
/// Serialized as a JSON number, `null` for [`MetricValue::Undefined`], or the
/// string `"insufficient_data"`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MetricValue {
    Value(f64),
    /// The computation ran but has no value (e.g. division by zero).
    #[default]
    Undefined,
    /// The inputs needed to run the computation were not present.
    InsufficientData,
}

impl MetricValue {
    /// `numerator / denominator`, undefined when the denominator is zero or the
    /// result is not finite.
    pub fn ratio(numerator: f64, denominator: f64) -> Self {
        if denominator == 0.0 {
            return Self::Undefined;
        }
        Self::finite(numerator / denominator)
    }

    /// Wrap a float, mapping NaN and infinities to `Undefined`.
    pub fn finite(value: f64) -> Self {
        if value.is_finite() {
            Self::Value(value)
        } else {
            Self::Undefined
        }
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    pub fn map(self, f: impl FnOnce(f64) -> f64) -> Self {
        match self {
            Self::Value(v) => Self::finite(f(v)),
            other => other,
        }
    }

    /// Descending order with every non-value after all values.
    pub fn cmp_desc(&self, other: &Self) -> Ordering {
        match (self.value(), other.value()) {
            (Some(a), Some(b)) => b.total_cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    /// Text for a delimited export cell; non-values become an empty cell.
    pub fn to_cell(&self) -> String {
        match self {
            Self::Value(v) => v.to_string(),
            Self::Undefined => String::new(),
            Self::InsufficientData => INSUFFICIENT_DATA.to_string(),
        }
    }
}

impl From<Option<f64>> for MetricValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Undefined, Self::finite)
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => serializer.serialize_f64(*v),
            Self::Undefined => serializer.serialize_none(),
            Self::InsufficientData => serializer.serialize_str(INSUFFICIENT_DATA),
        }
    }
}

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Marker(String),
        }

        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(Self::Undefined),
            Some(Repr::Number(v)) => Ok(Self::finite(v)),
            Some(Repr::Marker(m)) if m == INSUFFICIENT_DATA => Ok(Self::InsufficientData),
            Some(Repr::Marker(m)) => Err(D::Error::custom(format!(
                "unknown metric marker `{m}`"
            ))),
        }
    }
}
