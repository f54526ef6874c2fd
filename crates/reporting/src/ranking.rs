//! Ranking, bucketing and threshold alerts over result rows.

use crate::derived::WeightedMean;
use insight_core::config::AlertConfig;
use insight_core::{DiscountBucket, MetricValue};
use insight_query::rows::{CampaignRoiRow, CategorySensitivityRow};
use serde::Serialize;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use tracing::warn;

// ---------------------------------------------------------------------------
// Top-N
// ---------------------------------------------------------------------------

/// The `n` rows with the highest `metric`, descending, undefined last.
///
/// The sort is stable: ties keep their input order. Fewer than `n` rows
/// returns them all.
pub fn top_n<T, F>(rows: &[T], n: NonZeroUsize, metric: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&T) -> MetricValue,
{
    let mut ranked: Vec<&T> = rows.iter().collect();
    ranked.sort_by(|a, b| metric(*a).cmp_desc(&metric(*b)));
    ranked.into_iter().take(n.get()).cloned().collect()
}

/// Ranking size from configuration. Zero still ranks one row.
pub fn rank_size(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}

// ---------------------------------------------------------------------------
// Discount buckets
// ---------------------------------------------------------------------------

/// Group discount fractions by bucket, in bucket order. Empty buckets are
/// omitted and NaN values dropped.
pub fn bucket_discounts(values: &[f64]) -> Vec<(DiscountBucket, Vec<f64>)> {
    let mut buckets: BTreeMap<DiscountBucket, Vec<f64>> = BTreeMap::new();
    for &value in values {
        if let Some(bucket) = DiscountBucket::from_fraction(value) {
            buckets.entry(bucket).or_default().push(value);
        }
    }
    buckets.into_iter().collect()
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Rows whose metric is strictly below `threshold`. Rows without a value
/// are never flagged.
pub fn below_threshold<T, F>(rows: &[T], threshold: f64, metric: F) -> Vec<&T>
where
    F: Fn(&T) -> MetricValue,
{
    rows.iter()
        .filter(|row| metric(*row).value().is_some_and(|v| v < threshold))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedCampaign {
    pub campaign_id: String,
    pub campaign_name: String,
    pub roi_ratio: f64,
    pub budget: f64,
}

/// Campaigns returning less than the threshold, with the budget at stake.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoiAlert {
    pub threshold: f64,
    pub campaigns: Vec<FlaggedCampaign>,
    pub budget_exposure: f64,
}

impl RoiAlert {
    /// `None` when no campaign is below the threshold.
    pub fn evaluate(rows: &[CampaignRoiRow], threshold: f64) -> Option<Self> {
        let flagged = below_threshold(rows, threshold, |c| c.roi_ratio);
        if flagged.is_empty() {
            return None;
        }

        let campaigns: Vec<FlaggedCampaign> = flagged
            .iter()
            .filter_map(|c| {
                Some(FlaggedCampaign {
                    campaign_id: c.campaign_id.clone(),
                    campaign_name: c.campaign_name.clone(),
                    roi_ratio: c.roi_ratio.value()?,
                    budget: c.budget,
                })
            })
            .collect();
        let budget_exposure = campaigns.iter().map(|c| c.budget).sum();

        warn!(
            count = campaigns.len(),
            budget_exposure, threshold, "Campaigns below ROI threshold"
        );
        Some(Self {
            threshold,
            campaigns,
            budget_exposure,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromotionAlert {
    /// Average discount deep enough to threaten margins.
    MarginRisk { avg_discount_pct: f64, limit: f64 },
    /// Promotions running long enough to stop feeling exceptional.
    Trivialisation { avg_duration_days: f64, limit: f64 },
}

/// Averages over every category row, weighted by promotion count.
pub fn promotion_alerts(
    categories: &[CategorySensitivityRow],
    config: &AlertConfig,
) -> Vec<PromotionAlert> {
    let weight = |r: &CategorySensitivityRow| r.nb_promotions as f64;
    let discount: WeightedMean = categories
        .iter()
        .map(|r| (r.avg_discount_pct, weight(r)))
        .collect();
    let duration: WeightedMean = categories
        .iter()
        .map(|r| (r.avg_promo_duration_days, weight(r)))
        .collect();

    let mut alerts = Vec::new();
    if let Some(avg) = discount.value().value() {
        if avg > config.max_avg_discount_pct {
            alerts.push(PromotionAlert::MarginRisk {
                avg_discount_pct: avg,
                limit: config.max_avg_discount_pct,
            });
        }
    }
    if let Some(avg) = duration.value().value() {
        if avg > config.max_avg_duration_days {
            alerts.push(PromotionAlert::Trivialisation {
                avg_duration_days: avg,
                limit: config.max_avg_duration_days,
            });
        }
    }

    for alert in &alerts {
        warn!(?alert, "Promotion alert raised");
    }
    alerts
}
