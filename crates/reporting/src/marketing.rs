//! Marketing ROI view: portfolio KPIs, the ROI leaderboard, campaign-type
//! and audience performance, and the low-ROI alert.

use crate::derived::{portfolio_roi, WeightedMean};
use crate::export::{self, CsvTable};
use crate::ranking::{rank_size, top_n, RoiAlert};
use insight_core::{AppConfig, FilterCriteria, InsightResult, MetricValue};
use insight_query::rows::{AudienceRow, CampaignRoiRow, CampaignTypeRow};
use insight_query::templates::{
    self, AudiencePerformance, CampaignRoi, CampaignTypePerformance, QueryOutcome,
};
use insight_query::TabularStore;
use serde::Serialize;
use std::num::NonZeroUsize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketingKpis {
    pub nb_campaigns: usize,
    pub total_budget: f64,
    pub total_sales: f64,
    pub portfolio_roi: MetricValue,
    pub total_reach: u64,
    /// Reach-weighted conversion rate, in percent.
    pub avg_conversion_pct: MetricValue,
}

impl MarketingKpis {
    pub fn from_campaigns(campaigns: &[CampaignRoiRow]) -> Self {
        let conversion: WeightedMean = campaigns
            .iter()
            .map(|c| (MetricValue::Value(c.conversion_rate_pct), c.reach as f64))
            .collect();
        Self {
            nb_campaigns: campaigns.len(),
            total_budget: campaigns.iter().map(|c| c.budget).sum(),
            total_sales: campaigns.iter().map(|c| c.total_sales).sum(),
            portfolio_roi: portfolio_roi(campaigns),
            total_reach: campaigns.iter().map(|c| c.reach).sum(),
            avg_conversion_pct: conversion.value(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketingReport {
    pub kpis: Option<MarketingKpis>,
    /// Capped at `query.campaign_limit`; `kpis` and the alert are not.
    pub campaigns: QueryOutcome<CampaignRoiRow>,
    pub leaderboard: Vec<CampaignRoiRow>,
    pub podium: Vec<CampaignRoiRow>,
    pub campaign_types: QueryOutcome<CampaignTypeRow>,
    /// Campaign type with the highest average conversion.
    pub best_type: Option<CampaignTypeRow>,
    pub audiences: QueryOutcome<AudienceRow>,
    pub low_roi_alert: Option<RoiAlert>,
}

impl MarketingReport {
    pub fn csv_tables(&self) -> InsightResult<Vec<CsvTable>> {
        Ok(vec![
            export::table("campaign_roi", &self.campaigns)?,
            export::table("campaign_type_performance", &self.campaign_types)?,
            export::table("audience_performance", &self.audiences)?,
        ])
    }
}

pub fn marketing_report<S: TabularStore + ?Sized>(
    store: &S,
    criteria: &FilterCriteria,
    config: &AppConfig,
) -> InsightResult<MarketingReport> {
    let every_campaign = templates::run(&CampaignRoi { limit: None }, store, criteria)?;
    let campaign_types = templates::run(&CampaignTypePerformance, store, criteria)?;
    let audiences = templates::run(
        &AudiencePerformance {
            limit: config.query.audience_limit,
        },
        store,
        criteria,
    )?;

    // KPIs and the alert cover every matching campaign; only the table is capped.
    let kpis = every_campaign.rows().map(MarketingKpis::from_campaigns);
    let low_roi_alert =
        RoiAlert::evaluate(every_campaign.rows_or_empty(), config.alerts.roi_threshold);
    let matched = every_campaign.rows_or_empty().len();
    let campaigns = every_campaign.map(|mut rows| {
        rows.truncate(config.query.campaign_limit);
        rows
    });

    let rows = campaigns.rows_or_empty();
    let leaderboard = top_n(rows, rank_size(config.query.top_n), |c| c.roi_ratio);
    let podium = top_n(rows, rank_size(config.query.podium_size), |c| c.roi_ratio);
    let best_type = top_n(campaign_types.rows_or_empty(), NonZeroUsize::MIN, |t| {
        t.avg_conversion_pct
    })
    .into_iter()
    .next();

    metrics::counter!("reporting.views", "view" => "marketing").increment(1);
    info!(
        campaigns = matched,
        shown = rows.len(),
        flagged = low_roi_alert.as_ref().map_or(0, |a| a.campaigns.len()),
        "Marketing view computed"
    );

    Ok(MarketingReport {
        kpis,
        campaigns,
        leaderboard,
        podium,
        campaign_types,
        best_type,
        audiences,
        low_roi_alert,
    })
}
