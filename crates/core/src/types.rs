use crate::error::{InsightError, InsightResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// The only transaction type that participates in sales aggregates.
pub const SALE_TRANSACTION_TYPE: &str = "Sale";

/// A financial transaction from the cleaned transactions table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub region: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub transaction_type: String,
    pub payment_method: String,
}

impl Transaction {
    pub fn is_sale(&self) -> bool {
        self.transaction_type == SALE_TRANSACTION_TYPE
    }
}

/// A marketing campaign with its budget and active window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub campaign_type: String,
    pub region: String,
    pub budget: f64,
    pub reach: u64,
    /// Stored as a fraction in [0, 1].
    pub conversion_rate: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub target_audience: Option<String>,
}

impl Campaign {
    /// Whether `date` falls inside the campaign window, bounds included.
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// A promotion on one product category in one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: String,
    pub region: String,
    pub product_category: String,
    pub promotion_type: String,
    /// Stored as a fraction in [0, 1].
    pub discount_percentage: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Promotion {
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn duration_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }
}

/// The three fact tables loaded as one immutable snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    #[serde(default)]
    pub promotions: Vec<Promotion>,
}

impl Dataset {
    /// Read a JSON dataset file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> InsightResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let dataset: Dataset = serde_json::from_str(&raw)?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// Reject rows the cleaning stage should never have produced.
    pub fn validate(&self) -> InsightResult<()> {
        if let Some(tx) = self.transactions.iter().find(|t| !t.amount.is_finite()) {
            return Err(InsightError::InvalidDataset(format!(
                "transaction {} has a non-finite amount",
                tx.id
            )));
        }
        if let Some(c) = self.campaigns.iter().find(|c| c.end_date < c.start_date) {
            return Err(InsightError::InvalidDataset(format!(
                "campaign {} ends before it starts",
                c.id
            )));
        }
        if let Some(p) = self.promotions.iter().find(|p| p.end_date < p.start_date) {
            return Err(InsightError::InvalidDataset(format!(
                "promotion {} ends before it starts",
                p.id
            )));
        }
        Ok(())
    }
}

/// A filterable dimension. Each maps to one selection set in [`FilterCriteria`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Region,
    Category,
    PromotionType,
    PaymentMethod,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Region => "region",
            Self::Category => "category",
            Self::PromotionType => "promotion_type",
            Self::PaymentMethod => "payment_method",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive discount window, as fractions. Bounds are not clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscountRange {
    pub min: f64,
    pub max: f64,
}

impl DiscountRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// The whole [0, 1] spectrum.
    pub fn full() -> Self {
        Self { min: 0.0, max: 1.0 }
    }

    /// Build from whole-percent slider values (e.g. `(20, 40)`).
    pub fn from_percent(min_pct: f64, max_pct: f64) -> Self {
        Self {
            min: min_pct / 100.0,
            max: max_pct / 100.0,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

impl Default for DiscountRange {
    fn default() -> Self {
        Self::full()
    }
}

/// The user's current filter selections.
///
/// Rebuilt on every interaction and handed to the engine by value. Sets are
/// ordered so two equal selections always render identically.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default)]
    pub regions: BTreeSet<String>,
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default)]
    pub promotion_types: BTreeSet<String>,
    #[serde(default)]
    pub payment_methods: BTreeSet<String>,
    #[serde(default)]
    pub discount_range: DiscountRange,
    #[serde(default)]
    pub min_amount: f64,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = regions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_promotion_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.promotion_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_payment_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.payment_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_discount_range(mut self, range: DiscountRange) -> Self {
        self.discount_range = range;
        self
    }

    pub fn with_min_amount(mut self, min_amount: f64) -> Self {
        self.min_amount = min_amount;
        self
    }

    pub fn selection(&self, dimension: Dimension) -> &BTreeSet<String> {
        match dimension {
            Dimension::Region => &self.regions,
            Dimension::Category => &self.categories,
            Dimension::PromotionType => &self.promotion_types,
            Dimension::PaymentMethod => &self.payment_methods,
        }
    }

    /// Required dimensions whose selection set is empty.
    pub fn missing(&self, required: &[Dimension]) -> Vec<Dimension> {
        required
            .iter()
            .copied()
            .filter(|d| self.selection(*d).is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_missing_dimensions() {
        let criteria = FilterCriteria::new()
            .with_regions(["Nord"])
            .with_categories(Vec::<String>::new());
        let missing = criteria.missing(&[
            Dimension::Region,
            Dimension::Category,
            Dimension::PromotionType,
        ]);
        assert_eq!(missing, vec![Dimension::Category, Dimension::PromotionType]);
    }

    #[test]
    fn test_discount_range_from_percent_is_inclusive() {
        let range = DiscountRange::from_percent(20.0, 40.0);
        assert!(range.contains(0.20));
        assert!(range.contains(0.40));
        assert!(!range.contains(0.41));
    }

    #[test]
    fn test_campaign_window_includes_bounds() {
        let campaign = Campaign {
            id: "c1".into(),
            name: "Printemps".into(),
            campaign_type: "Email".into(),
            region: "Nord".into(),
            budget: 1000.0,
            reach: 5000,
            conversion_rate: 0.04,
            start_date: date("2024-03-01"),
            end_date: date("2024-03-31"),
            target_audience: None,
        };
        assert!(campaign.is_active_on(date("2024-03-01")));
        assert!(campaign.is_active_on(date("2024-03-31")));
        assert!(!campaign.is_active_on(date("2024-04-01")));
    }

    #[test]
    fn test_dataset_rejects_inverted_window() {
        let dataset = Dataset {
            promotions: vec![Promotion {
                id: "p1".into(),
                region: "Sud".into(),
                product_category: "Epices".into(),
                promotion_type: "Flash".into(),
                discount_percentage: 0.2,
                start_date: date("2024-05-10"),
                end_date: date("2024-05-01"),
            }],
            ..Default::default()
        };
        assert!(matches!(
            dataset.validate(),
            Err(InsightError::InvalidDataset(_))
        ));
    }
}
