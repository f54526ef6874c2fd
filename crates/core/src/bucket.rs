//! Fixed discount buckets used by the discount distribution view.

use serde::{Deserialize, Serialize};

/// A half-open discount range. A value exactly on a boundary belongs to the
/// higher bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiscountBucket {
    #[serde(rename = "<10%")]
    Under10,
    #[serde(rename = "10–19%")]
    From10To19,
    #[serde(rename = "20–29%")]
    From20To29,
    #[serde(rename = "30–39%")]
    From30To39,
    #[serde(rename = "40%+")]
    From40,
}

impl DiscountBucket {
    /// Lower boundaries as fractions, one per bucket after the first.
    pub const BOUNDARIES: [f64; 4] = [0.10, 0.20, 0.30, 0.40];

    pub const ALL: [DiscountBucket; 5] = [
        Self::Under10,
        Self::From10To19,
        Self::From20To29,
        Self::From30To39,
        Self::From40,
    ];

    /// Bucket for a discount fraction. `None` only for NaN.
    pub fn from_fraction(value: f64) -> Option<Self> {
        if value.is_nan() {
            return None;
        }
        let bucket = if value < Self::BOUNDARIES[0] {
            Self::Under10
        } else if value < Self::BOUNDARIES[1] {
            Self::From10To19
        } else if value < Self::BOUNDARIES[2] {
            Self::From20To29
        } else if value < Self::BOUNDARIES[3] {
            Self::From30To39
        } else {
            Self::From40
        };
        Some(bucket)
    }

    /// Whether `value` lies in this bucket's half-open range.
    pub fn contains(&self, value: f64) -> bool {
        let index = Self::ALL.iter().position(|b| b == self).unwrap_or(0);
        let above_lower = index == 0 || value >= Self::BOUNDARIES[index - 1];
        let below_upper = index == Self::BOUNDARIES.len() || value < Self::BOUNDARIES[index];
        above_lower && below_upper
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Under10 => "<10%",
            Self::From10To19 => "10–19%",
            Self::From20To29 => "20–29%",
            Self::From30To39 => "30–39%",
            Self::From40 => "40%+",
        }
    }
}

impl std::fmt::Display for DiscountBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries_fall_into_higher_bucket() {
        assert_eq!(DiscountBucket::from_fraction(0.10), Some(DiscountBucket::From10To19));
        assert_eq!(DiscountBucket::from_fraction(0.20), Some(DiscountBucket::From20To29));
        assert_eq!(DiscountBucket::from_fraction(0.30), Some(DiscountBucket::From30To39));
        assert_eq!(DiscountBucket::from_fraction(0.40), Some(DiscountBucket::From40));
        assert_eq!(DiscountBucket::from_fraction(0.0999), Some(DiscountBucket::Under10));
    }

    #[test]
    fn test_every_value_in_unit_interval_has_exactly_one_bucket() {
        for step in 0..=1000 {
            let value = step as f64 / 1000.0;
            let bucket = DiscountBucket::from_fraction(value).unwrap();
            let containing: Vec<_> = DiscountBucket::ALL
                .iter()
                .filter(|b| b.contains(value))
                .collect();
            assert_eq!(containing, vec![&bucket], "value {value}");
        }
    }

    #[test]
    fn test_nan_has_no_bucket() {
        assert_eq!(DiscountBucket::from_fraction(f64::NAN), None);
    }

    #[test]
    fn test_serializes_as_label() {
        let json = serde_json::to_string(&DiscountBucket::From10To19).unwrap();
        assert_eq!(json, "\"10–19%\"");
    }
}
