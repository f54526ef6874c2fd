//! Promotion analysis view: promotion impact on the average basket,
//! category sensitivity, discount distribution and regional activity.

use crate::derived::{basket_lift, is_positive, reaggregate, RegionScope};
use crate::export::{self, CsvTable};
use crate::ranking::{promotion_alerts, rank_size, top_n, PromotionAlert};
use insight_core::{AppConfig, FilterCriteria, InsightResult, MetricValue};
use insight_query::rows::{
    CategorySensitivityRow, DiscountRangeRow, PromotionImpactRow, RegionPromotionRow,
};
use insight_query::templates::{
    self, CategorySensitivity, DiscountDistribution, PromotionImpact, QueryOutcome,
    RegionPromotions,
};
use insight_query::TabularStore;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasketLift {
    /// Percent change of the average basket with a promotion over without.
    pub lift_pct: MetricValue,
    pub positive: bool,
}

/// Regions leading on each promotion measure.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegionPodiums {
    pub by_promotions: Vec<RegionPromotionRow>,
    pub by_discount: Vec<RegionPromotionRow>,
    pub by_categories: Vec<RegionPromotionRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromotionReport {
    pub impact: QueryOutcome<PromotionImpactRow>,
    pub basket_lift: Option<BasketLift>,
    pub categories: QueryOutcome<CategorySensitivityRow>,
    pub region_scope: RegionScope,
    /// Category rows narrowed or collapsed to `region_scope`.
    pub scoped_categories: Vec<CategorySensitivityRow>,
    /// Most promoted scoped category; `None` when none has a promotion.
    pub top_category: Option<CategorySensitivityRow>,
    pub discount_distribution: QueryOutcome<DiscountRangeRow>,
    pub regions: QueryOutcome<RegionPromotionRow>,
    pub region_podiums: RegionPodiums,
    pub alerts: Vec<PromotionAlert>,
}

impl PromotionReport {
    pub fn csv_tables(&self) -> InsightResult<Vec<CsvTable>> {
        Ok(vec![
            export::table("promotion_impact", &self.impact)?,
            export::table("category_sensitivity", &self.categories)?,
            export::table("discount_distribution", &self.discount_distribution)?,
            export::table("region_promotions", &self.regions)?,
        ])
    }
}

pub fn promotion_report<S: TabularStore + ?Sized>(
    store: &S,
    criteria: &FilterCriteria,
    scope: &RegionScope,
    config: &AppConfig,
) -> InsightResult<PromotionReport> {
    let impact = templates::run(&PromotionImpact, store, criteria)?;
    let categories = templates::run(&CategorySensitivity, store, criteria)?;
    let discount_distribution = templates::run(&DiscountDistribution, store, criteria)?;
    let regions = templates::run(&RegionPromotions, store, criteria)?;

    let basket_lift = impact.rows().map(|rows| {
        let lift_pct = basket_lift(rows);
        BasketLift {
            lift_pct,
            positive: is_positive(lift_pct),
        }
    });

    let scoped_categories = reaggregate(categories.rows_or_empty(), scope);
    let top_category = scoped_categories
        .iter()
        .find(|row| row.nb_promotions > 0)
        .cloned();

    let podium = rank_size(config.query.podium_size);
    let region_rows = regions.rows_or_empty();
    let region_podiums = RegionPodiums {
        by_promotions: top_n(region_rows, podium, |r| {
            MetricValue::Value(r.nb_promotions as f64)
        }),
        by_discount: top_n(region_rows, podium, |r| r.avg_discount_pct),
        by_categories: top_n(region_rows, podium, |r| {
            MetricValue::Value(r.nb_categories as f64)
        }),
    };

    let alerts = promotion_alerts(categories.rows_or_empty(), &config.alerts);

    metrics::counter!("reporting.views", "view" => "promotions").increment(1);
    info!(
        scope = %scope,
        categories = scoped_categories.len(),
        alerts = alerts.len(),
        "Promotion view computed"
    );

    Ok(PromotionReport {
        impact,
        basket_lift,
        categories,
        region_scope: scope.clone(),
        scoped_categories,
        top_category,
        discount_distribution,
        regions,
        region_podiums,
        alerts,
    })
}
