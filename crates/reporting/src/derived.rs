//! Derived metrics: ROI, percentage lift, and re-aggregation of
//! region-grouped rows to an "all regions" view.

use insight_core::MetricValue;
use insight_query::rows::{
    CampaignRoiRow, CategorySensitivityRow, DayOfWeekSalesRow, MonthlySalesRow, PromoStatus,
    PromotionImpactRow, RegionSalesRow,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Region label carried by re-aggregated rows.
pub const ALL_REGIONS: &str = "All";

// ─── Ratios ─────────────────────────────────────────────────────────────────

/// Attributed sales per unit of budget. A zero budget has no ROI.
pub fn roi_ratio(total_sales: f64, budget: f64) -> MetricValue {
    MetricValue::ratio(total_sales, budget)
}

/// Σ sales ÷ Σ budget over a set of campaigns.
pub fn portfolio_roi(campaigns: &[CampaignRoiRow]) -> MetricValue {
    let sales: f64 = campaigns.iter().map(|c| c.total_sales).sum();
    let budget: f64 = campaigns.iter().map(|c| c.budget).sum();
    roi_ratio(sales, budget)
}

/// `(with / without - 1) * 100`. Undefined when either side has no value or
/// the baseline is zero.
pub fn percentage_lift(with: MetricValue, without: MetricValue) -> MetricValue {
    match (with.value(), without.value()) {
        (Some(with), Some(without)) => {
            MetricValue::ratio(with, without).map(|ratio| (ratio - 1.0) * 100.0)
        }
        _ => MetricValue::Undefined,
    }
}

/// Lift of the average basket with a promotion over without.
///
/// Needs both status groups; otherwise the comparison does not run.
pub fn basket_lift(impact: &[PromotionImpactRow]) -> MetricValue {
    let find = |status: PromoStatus| impact.iter().find(|r| r.promo_status == status);
    match (
        find(PromoStatus::WithPromotion),
        find(PromoStatus::WithoutPromotion),
    ) {
        (Some(with), Some(without)) => {
            percentage_lift(with.avg_transaction_value, without.avg_transaction_value)
        }
        _ => MetricValue::InsufficientData,
    }
}

pub fn is_positive(lift: MetricValue) -> bool {
    lift.value().is_some_and(|v| v > 0.0)
}

/// Σ(value × weight) ÷ Σ weight. Undefined values and non-positive weights
/// are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedMean {
    weighted_sum: f64,
    weight: f64,
}

impl WeightedMean {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: MetricValue, weight: f64) {
        if let Some(v) = value.value() {
            if weight > 0.0 {
                self.weighted_sum += v * weight;
                self.weight += weight;
            }
        }
    }

    pub fn value(&self) -> MetricValue {
        MetricValue::ratio(self.weighted_sum, self.weight)
    }
}

impl FromIterator<(MetricValue, f64)> for WeightedMean {
    fn from_iter<I: IntoIterator<Item = (MetricValue, f64)>>(iter: I) -> Self {
        let mut mean = Self::new();
        for (value, weight) in iter {
            mean.add(value, weight);
        }
        mean
    }
}

// ─── Region scope ───────────────────────────────────────────────────────────

/// Whether a region-grouped table is shown across all regions or for one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionScope {
    #[default]
    All,
    Region(String),
}

/// Only the exact name `"All"` is reserved; any other text, including
/// `"all"`, names a region.
impl std::str::FromStr for RegionScope {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == ALL_REGIONS {
            Ok(Self::All)
        } else {
            Ok(Self::Region(s.to_string()))
        }
    }
}

impl std::fmt::Display for RegionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str(ALL_REGIONS),
            Self::Region(region) => f.write_str(region),
        }
    }
}

/// A row grouped by region (possibly among other keys) that can be collapsed
/// across regions without losing exactness.
pub trait RegionalRow: Clone {
    /// The grouping key once the region is dropped.
    type Key: Ord;

    fn region(&self) -> &str;

    fn collapsed_key(&self) -> Self::Key;

    /// Combine rows sharing a collapsed key. Sums are re-summed and averages
    /// recomputed from their weights, never averaged.
    fn merge(rows: &[Self], region: &str) -> Self;

    fn order(a: &Self, b: &Self) -> Ordering;
}

/// Narrow or collapse region-grouped rows to `scope`.
pub fn reaggregate<T: RegionalRow>(rows: &[T], scope: &RegionScope) -> Vec<T> {
    match scope {
        RegionScope::Region(region) => rows
            .iter()
            .filter(|row| row.region() == region.as_str())
            .cloned()
            .collect(),
        RegionScope::All => {
            let mut groups: BTreeMap<T::Key, Vec<T>> = BTreeMap::new();
            for row in rows {
                groups.entry(row.collapsed_key()).or_default().push(row.clone());
            }
            let mut merged: Vec<T> = groups
                .into_values()
                .map(|group| T::merge(&group, ALL_REGIONS))
                .collect();
            merged.sort_by(T::order);
            merged
        }
    }
}

/// Count, total and exact average of a set of sales rows.
fn merge_sales(rows: impl Iterator<Item = (u64, f64)>) -> (u64, f64, MetricValue) {
    let (count, total) = rows.fold((0u64, 0.0f64), |(n, s), (rn, rs)| (n + rn, s + rs));
    (count, total, MetricValue::ratio(total, count as f64))
}

impl RegionalRow for RegionSalesRow {
    type Key = ();

    fn region(&self) -> &str {
        &self.region
    }

    fn collapsed_key(&self) -> Self::Key {}

    fn merge(rows: &[Self], region: &str) -> Self {
        let (nb_transactions, total_sales, avg_transaction_value) =
            merge_sales(rows.iter().map(|r| (r.nb_transactions, r.total_sales)));
        Self {
            region: region.to_string(),
            nb_transactions,
            total_sales,
            avg_transaction_value,
        }
    }

    fn order(a: &Self, b: &Self) -> Ordering {
        Self::canonical_cmp(a, b)
    }
}

impl RegionalRow for MonthlySalesRow {
    type Key = chrono::NaiveDate;

    fn region(&self) -> &str {
        &self.region
    }

    fn collapsed_key(&self) -> Self::Key {
        self.month
    }

    fn merge(rows: &[Self], region: &str) -> Self {
        let (nb_transactions, total_sales, avg_transaction_value) =
            merge_sales(rows.iter().map(|r| (r.nb_transactions, r.total_sales)));
        Self {
            month: rows.first().map(|r| r.month).unwrap_or_default(),
            region: region.to_string(),
            nb_transactions,
            total_sales,
            avg_transaction_value,
        }
    }

    fn order(a: &Self, b: &Self) -> Ordering {
        Self::canonical_cmp(a, b)
    }
}

impl RegionalRow for DayOfWeekSalesRow {
    type Key = u32;

    fn region(&self) -> &str {
        &self.region
    }

    fn collapsed_key(&self) -> Self::Key {
        self.day_num
    }

    fn merge(rows: &[Self], region: &str) -> Self {
        let (nb_transactions, total_sales, avg_transaction_value) =
            merge_sales(rows.iter().map(|r| (r.nb_transactions, r.total_sales)));
        let first = rows.first();
        Self {
            day_of_week: first.map(|r| r.day_of_week.clone()).unwrap_or_default(),
            day_num: first.map(|r| r.day_num).unwrap_or_default(),
            region: region.to_string(),
            nb_transactions,
            total_sales,
            avg_transaction_value,
        }
    }

    fn order(a: &Self, b: &Self) -> Ordering {
        Self::canonical_cmp(a, b)
    }
}

impl RegionalRow for CategorySensitivityRow {
    type Key = String;

    fn region(&self) -> &str {
        &self.region
    }

    fn collapsed_key(&self) -> Self::Key {
        self.product_category.clone()
    }

    // Per-row averages are over exactly nb_promotions promotions, so they are
    // re-weighted by that count.
    fn merge(rows: &[Self], region: &str) -> Self {
        let weight = |r: &Self| r.nb_promotions as f64;
        let discount: WeightedMean = rows
            .iter()
            .map(|r| (r.avg_discount_pct, weight(r)))
            .collect();
        let duration: WeightedMean = rows
            .iter()
            .map(|r| (r.avg_promo_duration_days, weight(r)))
            .collect();
        let min = rows
            .iter()
            .filter_map(|r| r.min_discount_pct.value())
            .reduce(f64::min);
        let max = rows
            .iter()
            .filter_map(|r| r.max_discount_pct.value())
            .reduce(f64::max);

        Self {
            product_category: rows
                .first()
                .map(|r| r.product_category.clone())
                .unwrap_or_default(),
            region: region.to_string(),
            nb_promotions: rows.iter().map(|r| r.nb_promotions).sum(),
            avg_discount_pct: discount.value(),
            min_discount_pct: MetricValue::from(min),
            max_discount_pct: MetricValue::from(max),
            avg_promo_duration_days: duration.value(),
        }
    }

    fn order(a: &Self, b: &Self) -> Ordering {
        Self::canonical_cmp(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn roi_row(id: &str, budget: f64, sales: f64) -> CampaignRoiRow {
        CampaignRoiRow {
            campaign_id: id.into(),
            campaign_name: id.into(),
            campaign_type: "Email".into(),
            region: "Nord".into(),
            budget,
            reach: 0,
            conversion_rate_pct: 0.0,
            nb_sales: 0,
            total_sales: sales,
            roi_ratio: roi_ratio(sales, budget),
        }
    }

    fn impact(status: PromoStatus, avg: f64) -> PromotionImpactRow {
        PromotionImpactRow {
            promo_status: status,
            nb_transactions: 10,
            total_sales: avg * 10.0,
            avg_transaction_value: MetricValue::Value(avg),
        }
    }

    fn region_sales(region: &str, count: u64, total: f64) -> RegionSalesRow {
        RegionSalesRow {
            region: region.into(),
            nb_transactions: count,
            total_sales: total,
            avg_transaction_value: MetricValue::ratio(total, count as f64),
        }
    }

    #[test]
    fn test_roi_examples() {
        assert_eq!(roi_ratio(2500.0, 1000.0), MetricValue::Value(2.5));
        assert_eq!(roi_ratio(0.0, 500.0), MetricValue::Value(0.0));
        assert_eq!(roi_ratio(100.0, 0.0), MetricValue::Undefined);
    }

    #[test]
    fn test_portfolio_roi_is_ratio_of_sums() {
        let rows = vec![roi_row("A", 1000.0, 2500.0), roi_row("C", 0.0, 100.0)];
        assert_eq!(portfolio_roi(&rows), MetricValue::Value(2.6));
        assert_eq!(portfolio_roi(&[]), MetricValue::Undefined);
    }

    #[test]
    fn test_basket_lift_positive() {
        let rows = vec![
            impact(PromoStatus::WithPromotion, 45.0),
            impact(PromoStatus::WithoutPromotion, 30.0),
        ];
        let lift = basket_lift(&rows);
        assert_eq!(lift, MetricValue::Value(50.0));
        assert!(is_positive(lift));
    }

    #[test]
    fn test_basket_lift_needs_both_groups() {
        let rows = vec![impact(PromoStatus::WithPromotion, 45.0)];
        assert_eq!(basket_lift(&rows), MetricValue::InsufficientData);
        assert!(!is_positive(basket_lift(&[])));
    }

    #[test]
    fn test_lift_with_zero_baseline_is_undefined() {
        let rows = vec![
            impact(PromoStatus::WithPromotion, 45.0),
            impact(PromoStatus::WithoutPromotion, 0.0),
        ];
        assert_eq!(basket_lift(&rows), MetricValue::Undefined);
    }

    #[test]
    fn test_negative_lift_is_not_positive() {
        let lift = percentage_lift(MetricValue::Value(20.0), MetricValue::Value(40.0));
        assert_eq!(lift, MetricValue::Value(-50.0));
        assert!(!is_positive(lift));
    }

    #[test]
    fn test_all_regions_average_is_exact_weighted_mean() {
        let rows = vec![
            region_sales("Nord", 3, 300.0),
            region_sales("Sud", 1, 500.0),
        ];
        let all = reaggregate(&rows, &RegionScope::All);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].region, ALL_REGIONS);
        assert_eq!(all[0].nb_transactions, 4);
        assert!((all[0].total_sales - 800.0).abs() < f64::EPSILON);
        // Mean of means would be 300.
        assert_eq!(all[0].avg_transaction_value, MetricValue::Value(200.0));
    }

    #[test]
    fn test_single_region_scope_filters() {
        let rows = vec![
            region_sales("Nord", 3, 300.0),
            region_sales("Sud", 1, 500.0),
        ];
        let sud = reaggregate(&rows, &RegionScope::Region("Sud".into()));
        assert_eq!(sud, vec![rows[1].clone()]);
        assert!(reaggregate(&rows, &"Ouest".parse().unwrap()).is_empty());
    }

    #[test]
    fn test_monthly_totals_invariant_under_collapse() {
        let month = |m| NaiveDate::from_ymd_opt(2024, m, 1).unwrap();
        let row = |m, region: &str, count, total| MonthlySalesRow {
            month: month(m),
            region: region.into(),
            nb_transactions: count,
            total_sales: total,
            avg_transaction_value: MetricValue::ratio(total, count as f64),
        };
        let rows = vec![
            row(1, "Nord", 2, 100.0),
            row(1, "Sud", 1, 50.0),
            row(2, "Nord", 4, 400.0),
        ];
        let all = reaggregate(&rows, &RegionScope::All);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].month, month(1));
        let before: f64 = rows.iter().map(|r| r.total_sales).sum();
        let after: f64 = all.iter().map(|r| r.total_sales).sum();
        assert!((before - after).abs() < f64::EPSILON);
        assert_eq!(all[0].avg_transaction_value, MetricValue::Value(50.0));
    }

    #[test]
    fn test_category_collapse_weights_by_promotion_count() {
        let row = |region: &str, n, avg, min, max, days| CategorySensitivityRow {
            product_category: "Epices".into(),
            region: region.into(),
            nb_promotions: n,
            avg_discount_pct: avg,
            min_discount_pct: min,
            max_discount_pct: max,
            avg_promo_duration_days: days,
        };
        let rows = vec![
            row(
                "Nord",
                3,
                MetricValue::Value(10.0),
                MetricValue::Value(5.0),
                MetricValue::Value(15.0),
                MetricValue::Value(4.0),
            ),
            row(
                "Sud",
                1,
                MetricValue::Value(30.0),
                MetricValue::Value(30.0),
                MetricValue::Value(30.0),
                MetricValue::Value(8.0),
            ),
            row(
                "Est",
                0,
                MetricValue::Undefined,
                MetricValue::Undefined,
                MetricValue::Undefined,
                MetricValue::Undefined,
            ),
        ];
        let all = reaggregate(&rows, &RegionScope::All);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].nb_promotions, 4);
        assert_eq!(all[0].avg_discount_pct, MetricValue::Value(15.0));
        assert_eq!(all[0].min_discount_pct, MetricValue::Value(5.0));
        assert_eq!(all[0].max_discount_pct, MetricValue::Value(30.0));
        assert_eq!(all[0].avg_promo_duration_days, MetricValue::Value(5.0));
    }

    #[test]
    fn test_weighted_mean_skips_undefined() {
        let mean: WeightedMean = vec![
            (MetricValue::Value(10.0), 1.0),
            (MetricValue::Undefined, 5.0),
            (MetricValue::Value(40.0), 0.0),
        ]
        .into_iter()
        .collect();
        assert_eq!(mean.value(), MetricValue::Value(10.0));
        assert_eq!(WeightedMean::new().value(), MetricValue::Undefined);
    }

    #[test]
    fn test_region_scope_parsing() {
        assert_eq!("All".parse::<RegionScope>().unwrap(), RegionScope::All);
        assert_eq!(
            "all".parse::<RegionScope>().unwrap(),
            RegionScope::Region("all".into())
        );
        assert_eq!(
            "Nord".parse::<RegionScope>().unwrap(),
            RegionScope::Region("Nord".into())
        );
        assert_eq!(RegionScope::All.to_string(), "All");
    }
}
