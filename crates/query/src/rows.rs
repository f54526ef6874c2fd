//! Aggregate row types, one per metric template.
//!
//! Field names double as the column names of the raw rows a store returns
//! and of the header row of an export.

use chrono::NaiveDate;
use insight_core::{DiscountBucket, MetricValue};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A row that can be flattened into a delimited record.
pub trait TabularRow {
    /// Header row, in cell order.
    const COLUMNS: &'static [&'static str];

    fn cells(&self) -> Vec<String>;
}

/// Whether a sale fell inside an active promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PromoStatus {
    #[serde(rename = "Avec promotion")]
    WithPromotion,
    #[serde(rename = "Sans promotion")]
    WithoutPromotion,
}

impl PromoStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::WithPromotion => "Avec promotion",
            Self::WithoutPromotion => "Sans promotion",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignRoiRow {
    pub campaign_id: String,
    pub campaign_name: String,
    pub campaign_type: String,
    pub region: String,
    pub budget: f64,
    pub reach: u64,
    pub conversion_rate_pct: f64,
    pub nb_sales: u64,
    pub total_sales: f64,
    #[serde(default)]
    pub roi_ratio: MetricValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignTypeRow {
    pub campaign_type: String,
    pub nb_campaigns: u64,
    pub total_budget: f64,
    #[serde(default)]
    pub avg_budget: MetricValue,
    #[serde(default)]
    pub avg_conversion_pct: MetricValue,
    #[serde(default)]
    pub avg_reach: MetricValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudienceRow {
    pub target_audience: String,
    pub nb_campaigns: u64,
    #[serde(default)]
    pub avg_conversion_pct: MetricValue,
    pub total_budget: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionImpactRow {
    pub promo_status: PromoStatus,
    pub nb_transactions: u64,
    pub total_sales: f64,
    #[serde(default)]
    pub avg_transaction_value: MetricValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySensitivityRow {
    pub product_category: String,
    pub region: String,
    pub nb_promotions: u64,
    #[serde(default)]
    pub avg_discount_pct: MetricValue,
    #[serde(default)]
    pub min_discount_pct: MetricValue,
    #[serde(default)]
    pub max_discount_pct: MetricValue,
    #[serde(default)]
    pub avg_promo_duration_days: MetricValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountRangeRow {
    pub discount_range: DiscountBucket,
    pub nb_promotions: u64,
    pub total_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionPromotionRow {
    pub region: String,
    pub nb_promotions: u64,
    #[serde(default)]
    pub avg_discount_pct: MetricValue,
    pub nb_categories: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySalesRow {
    /// First day of the month.
    pub month: NaiveDate,
    pub region: String,
    pub nb_transactions: u64,
    pub total_sales: f64,
    #[serde(default)]
    pub avg_transaction_value: MetricValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSalesRow {
    pub region: String,
    pub nb_transactions: u64,
    pub total_sales: f64,
    #[serde(default)]
    pub avg_transaction_value: MetricValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayOfWeekSalesRow {
    pub day_of_week: String,
    /// 0 = Sunday.
    pub day_num: u32,
    pub region: String,
    pub nb_transactions: u64,
    pub total_sales: f64,
    #[serde(default)]
    pub avg_transaction_value: MetricValue,
}

// ─── Canonical orderings ────────────────────────────────────────────────────

pub(crate) fn desc_f64(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}

impl CampaignRoiRow {
    pub fn canonical_cmp(a: &Self, b: &Self) -> Ordering {
        a.roi_ratio
            .cmp_desc(&b.roi_ratio)
            .then_with(|| a.campaign_id.cmp(&b.campaign_id))
    }
}

impl CampaignTypeRow {
    pub fn canonical_cmp(a: &Self, b: &Self) -> Ordering {
        a.avg_conversion_pct
            .cmp_desc(&b.avg_conversion_pct)
            .then_with(|| a.campaign_type.cmp(&b.campaign_type))
    }
}

impl AudienceRow {
    pub fn canonical_cmp(a: &Self, b: &Self) -> Ordering {
        a.avg_conversion_pct
            .cmp_desc(&b.avg_conversion_pct)
            .then_with(|| a.target_audience.cmp(&b.target_audience))
    }
}

impl PromotionImpactRow {
    pub fn canonical_cmp(a: &Self, b: &Self) -> Ordering {
        desc_f64(a.total_sales, b.total_sales).then_with(|| a.promo_status.cmp(&b.promo_status))
    }
}

impl CategorySensitivityRow {
    pub fn canonical_cmp(a: &Self, b: &Self) -> Ordering {
        b.nb_promotions
            .cmp(&a.nb_promotions)
            .then_with(|| a.product_category.cmp(&b.product_category))
            .then_with(|| a.region.cmp(&b.region))
    }
}

impl DiscountRangeRow {
    pub fn canonical_cmp(a: &Self, b: &Self) -> Ordering {
        a.discount_range.cmp(&b.discount_range)
    }
}

impl RegionPromotionRow {
    pub fn canonical_cmp(a: &Self, b: &Self) -> Ordering {
        b.nb_promotions
            .cmp(&a.nb_promotions)
            .then_with(|| a.region.cmp(&b.region))
    }
}

impl MonthlySalesRow {
    pub fn canonical_cmp(a: &Self, b: &Self) -> Ordering {
        a.month.cmp(&b.month).then_with(|| a.region.cmp(&b.region))
    }
}

impl RegionSalesRow {
    pub fn canonical_cmp(a: &Self, b: &Self) -> Ordering {
        desc_f64(a.total_sales, b.total_sales).then_with(|| a.region.cmp(&b.region))
    }
}

impl DayOfWeekSalesRow {
    pub fn canonical_cmp(a: &Self, b: &Self) -> Ordering {
        a.day_num
            .cmp(&b.day_num)
            .then_with(|| a.region.cmp(&b.region))
    }
}

// ─── Export cells ───────────────────────────────────────────────────────────

impl TabularRow for CampaignRoiRow {
    const COLUMNS: &'static [&'static str] = &[
        "campaign_id",
        "campaign_name",
        "campaign_type",
        "region",
        "budget",
        "reach",
        "conversion_rate_pct",
        "nb_sales",
        "total_sales",
        "roi_ratio",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.campaign_id.clone(),
            self.campaign_name.clone(),
            self.campaign_type.clone(),
            self.region.clone(),
            self.budget.to_string(),
            self.reach.to_string(),
            self.conversion_rate_pct.to_string(),
            self.nb_sales.to_string(),
            self.total_sales.to_string(),
            self.roi_ratio.to_cell(),
        ]
    }
}

impl TabularRow for CampaignTypeRow {
    const COLUMNS: &'static [&'static str] = &[
        "campaign_type",
        "nb_campaigns",
        "total_budget",
        "avg_budget",
        "avg_conversion_pct",
        "avg_reach",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.campaign_type.clone(),
            self.nb_campaigns.to_string(),
            self.total_budget.to_string(),
            self.avg_budget.to_cell(),
            self.avg_conversion_pct.to_cell(),
            self.avg_reach.to_cell(),
        ]
    }
}

impl TabularRow for AudienceRow {
    const COLUMNS: &'static [&'static str] = &[
        "target_audience",
        "nb_campaigns",
        "avg_conversion_pct",
        "total_budget",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.target_audience.clone(),
            self.nb_campaigns.to_string(),
            self.avg_conversion_pct.to_cell(),
            self.total_budget.to_string(),
        ]
    }
}

impl TabularRow for PromotionImpactRow {
    const COLUMNS: &'static [&'static str] = &[
        "promo_status",
        "nb_transactions",
        "total_sales",
        "avg_transaction_value",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.promo_status.label().to_string(),
            self.nb_transactions.to_string(),
            self.total_sales.to_string(),
            self.avg_transaction_value.to_cell(),
        ]
    }
}

impl TabularRow for CategorySensitivityRow {
    const COLUMNS: &'static [&'static str] = &[
        "product_category",
        "region",
        "nb_promotions",
        "avg_discount_pct",
        "min_discount_pct",
        "max_discount_pct",
        "avg_promo_duration_days",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.product_category.clone(),
            self.region.clone(),
            self.nb_promotions.to_string(),
            self.avg_discount_pct.to_cell(),
            self.min_discount_pct.to_cell(),
            self.max_discount_pct.to_cell(),
            self.avg_promo_duration_days.to_cell(),
        ]
    }
}

impl TabularRow for DiscountRangeRow {
    const COLUMNS: &'static [&'static str] = &["discount_range", "nb_promotions", "total_days"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.discount_range.label().to_string(),
            self.nb_promotions.to_string(),
            self.total_days.to_string(),
        ]
    }
}

impl TabularRow for RegionPromotionRow {
    const COLUMNS: &'static [&'static str] =
        &["region", "nb_promotions", "avg_discount_pct", "nb_categories"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.region.clone(),
            self.nb_promotions.to_string(),
            self.avg_discount_pct.to_cell(),
            self.nb_categories.to_string(),
        ]
    }
}

impl TabularRow for MonthlySalesRow {
    const COLUMNS: &'static [&'static str] = &[
        "month",
        "region",
        "nb_transactions",
        "total_sales",
        "avg_transaction_value",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.month.to_string(),
            self.region.clone(),
            self.nb_transactions.to_string(),
            self.total_sales.to_string(),
            self.avg_transaction_value.to_cell(),
        ]
    }
}

impl TabularRow for RegionSalesRow {
    const COLUMNS: &'static [&'static str] = &[
        "region",
        "nb_transactions",
        "total_sales",
        "avg_transaction_value",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.region.clone(),
            self.nb_transactions.to_string(),
            self.total_sales.to_string(),
            self.avg_transaction_value.to_cell(),
        ]
    }
}

impl TabularRow for DayOfWeekSalesRow {
    const COLUMNS: &'static [&'static str] = &[
        "day_of_week",
        "day_num",
        "region",
        "nb_transactions",
        "total_sales",
        "avg_transaction_value",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.day_of_week.clone(),
            self.day_num.to_string(),
            self.region.clone(),
            self.nb_transactions.to_string(),
            self.total_sales.to_string(),
            self.avg_transaction_value.to_cell(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn campaign(id: &str, roi: MetricValue) -> CampaignRoiRow {
        CampaignRoiRow {
            campaign_id: id.into(),
            campaign_name: id.into(),
            campaign_type: "Email".into(),
            region: "Nord".into(),
            budget: 100.0,
            reach: 10,
            conversion_rate_pct: 5.0,
            nb_sales: 0,
            total_sales: 0.0,
            roi_ratio: roi,
        }
    }

    #[test]
    fn test_campaign_order_puts_undefined_roi_last() {
        let mut rows = vec![
            campaign("c", MetricValue::Undefined),
            campaign("b", MetricValue::Value(0.0)),
            campaign("a", MetricValue::Value(2.5)),
        ];
        rows.sort_by(CampaignRoiRow::canonical_cmp);
        let ids: Vec<_> = rows.iter().map(|r| r.campaign_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_columns_match_serialized_field_names() {
        let row = campaign("a", MetricValue::Value(1.0));
        let value = serde_json::to_value(&row).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), CampaignRoiRow::COLUMNS.len());
        for column in CampaignRoiRow::COLUMNS {
            assert!(object.contains_key(*column), "missing {column}");
        }
        assert_eq!(row.cells().len(), CampaignRoiRow::COLUMNS.len());
    }

    #[test]
    fn test_raw_row_with_null_average_decodes_as_undefined() {
        let row: RegionPromotionRow = serde_json::from_str(
            r#"{"region": "Sud", "nb_promotions": 0, "avg_discount_pct": null, "nb_categories": 0}"#,
        )
        .unwrap();
        assert_eq!(row.avg_discount_pct, MetricValue::Undefined);
    }

    #[test]
    fn test_promo_status_labels() {
        let json = serde_json::to_string(&PromoStatus::WithPromotion).unwrap();
        assert_eq!(json, "\"Avec promotion\"");
        assert_eq!(PromoStatus::WithoutPromotion.label(), "Sans promotion");
    }
}
