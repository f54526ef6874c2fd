//! In-memory reference warehouse.
//!
//! Executes every template over a loaded [`Dataset`] by evaluating the
//! query's predicates directly, with the same join and inclusion rules the
//! SQL expresses: region-and-window attribution, outer grouping keys, and
//! "Sale"-only sales aggregates.

use crate::predicate::{Column, Predicate};
use crate::rows::*;
use crate::store::{OptionSource, RawRow, TabularStore};
use crate::templates::{AggregationQuery, TemplateKind};
use chrono::{Datelike, NaiveDate, Weekday};
use insight_core::{
    to_percent, Campaign, Dataset, DiscountBucket, InsightError, InsightResult, MetricValue,
    Promotion, Transaction,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Running count / sum / extremes of one measure.
#[derive(Debug, Clone, Copy, Default)]
struct Agg {
    count: u64,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl Agg {
    fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    fn mean(&self) -> MetricValue {
        MetricValue::ratio(self.sum, self.count as f64)
    }
}

/// Per-group promotion measures. Promotions are counted by distinct id.
#[derive(Debug, Default)]
struct PromoGroup<'a> {
    ids: BTreeSet<&'a str>,
    categories: BTreeSet<&'a str>,
    discount: Agg,
    duration: Agg,
}

impl<'a> PromoGroup<'a> {
    fn push(&mut self, promotion: &'a Promotion) {
        self.ids.insert(&promotion.id);
        self.categories.insert(&promotion.product_category);
        self.discount.push(promotion.discount_percentage);
        self.duration.push(promotion.duration_days() as f64);
    }
}

pub fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Sun => "Sun",
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
    }
}

/// A [`TabularStore`] over an immutable in-memory snapshot.
#[derive(Debug, Clone)]
pub struct InMemoryWarehouse {
    dataset: Arc<Dataset>,
}

impl InMemoryWarehouse {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset: Arc::new(dataset),
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    fn transactions<'a>(
        &'a self,
        predicate: &'a Predicate,
    ) -> impl Iterator<Item = &'a Transaction> {
        self.dataset
            .transactions
            .iter()
            .filter(move |t| predicate.matches(*t))
    }

    fn campaigns<'a>(&'a self, predicate: &'a Predicate) -> impl Iterator<Item = &'a Campaign> {
        self.dataset
            .campaigns
            .iter()
            .filter(move |c| predicate.matches(*c))
    }

    fn promotions<'a>(&'a self, predicate: &'a Predicate) -> impl Iterator<Item = &'a Promotion> {
        self.dataset
            .promotions
            .iter()
            .filter(move |p| predicate.matches(*p))
    }

    // ─── Marketing ──────────────────────────────────────────────────────

    fn campaign_roi(&self, query: &AggregationQuery) -> Vec<CampaignRoiRow> {
        let sales: Vec<&Transaction> = self.transactions(&query.transactions).collect();

        self.campaigns(&query.campaigns)
            .map(|c| {
                let mut attributed = Agg::default();
                for t in sales
                    .iter()
                    .filter(|t| t.region == c.region && c.is_active_on(t.date))
                {
                    attributed.push(t.amount);
                }
                CampaignRoiRow {
                    campaign_id: c.id.clone(),
                    campaign_name: c.name.clone(),
                    campaign_type: c.campaign_type.clone(),
                    region: c.region.clone(),
                    budget: c.budget,
                    reach: c.reach,
                    conversion_rate_pct: to_percent(c.conversion_rate),
                    nb_sales: attributed.count,
                    total_sales: attributed.sum,
                    roi_ratio: MetricValue::ratio(attributed.sum, c.budget),
                }
            })
            .collect()
    }

    fn campaign_types(&self, query: &AggregationQuery) -> Vec<CampaignTypeRow> {
        let mut groups: BTreeMap<&str, (Agg, Agg, Agg)> = BTreeMap::new();
        for c in self.campaigns(&query.campaigns) {
            let (budget, conversion, reach) = groups.entry(c.campaign_type.as_str()).or_default();
            budget.push(c.budget);
            conversion.push(c.conversion_rate);
            reach.push(c.reach as f64);
        }

        groups
            .into_iter()
            .map(|(campaign_type, (budget, conversion, reach))| CampaignTypeRow {
                campaign_type: campaign_type.to_string(),
                nb_campaigns: budget.count,
                total_budget: budget.sum,
                avg_budget: budget.mean(),
                avg_conversion_pct: conversion.mean().map(to_percent),
                avg_reach: reach.mean(),
            })
            .collect()
    }

    fn audiences(&self, query: &AggregationQuery) -> Vec<AudienceRow> {
        let mut groups: BTreeMap<&str, (Agg, Agg)> = BTreeMap::new();
        for c in self.campaigns(&query.campaigns) {
            let Some(audience) = c.target_audience.as_deref() else {
                continue;
            };
            let (conversion, budget) = groups.entry(audience).or_default();
            conversion.push(c.conversion_rate);
            budget.push(c.budget);
        }

        groups
            .into_iter()
            .map(|(audience, (conversion, budget))| AudienceRow {
                target_audience: audience.to_string(),
                nb_campaigns: conversion.count,
                avg_conversion_pct: conversion.mean().map(to_percent),
                total_budget: budget.sum,
            })
            .collect()
    }

    // ─── Promotions ─────────────────────────────────────────────────────

    fn promotion_impact(&self, query: &AggregationQuery) -> Vec<PromotionImpactRow> {
        let promotions: Vec<&Promotion> = self.promotions(&query.promotions).collect();

        let mut groups: BTreeMap<PromoStatus, Agg> = BTreeMap::new();
        for t in self.transactions(&query.transactions) {
            let covered = promotions
                .iter()
                .any(|p| p.region == t.region && p.is_active_on(t.date));
            let status = if covered {
                PromoStatus::WithPromotion
            } else {
                PromoStatus::WithoutPromotion
            };
            groups.entry(status).or_default().push(t.amount);
        }

        groups
            .into_iter()
            .map(|(promo_status, sales)| PromotionImpactRow {
                promo_status,
                nb_transactions: sales.count,
                total_sales: sales.sum,
                avg_transaction_value: sales.mean(),
            })
            .collect()
    }

    fn category_sensitivity(&self, query: &AggregationQuery) -> Vec<CategorySensitivityRow> {
        let keys = query
            .promotions
            .restricted_to(&[Column::Region, Column::ProductCategory]);
        let mut groups: BTreeMap<(&str, &str), PromoGroup<'_>> = self
            .promotions(&keys)
            .map(|p| ((p.product_category.as_str(), p.region.as_str()), PromoGroup::default()))
            .collect();

        for p in self.promotions(&query.promotions) {
            groups
                .entry((p.product_category.as_str(), p.region.as_str()))
                .or_default()
                .push(p);
        }

        groups
            .into_iter()
            .map(|((category, region), group)| CategorySensitivityRow {
                product_category: category.to_string(),
                region: region.to_string(),
                nb_promotions: group.ids.len() as u64,
                avg_discount_pct: group.discount.mean().map(to_percent),
                min_discount_pct: MetricValue::from(group.discount.min).map(to_percent),
                max_discount_pct: MetricValue::from(group.discount.max).map(to_percent),
                avg_promo_duration_days: group.duration.mean(),
            })
            .collect()
    }

    fn discount_distribution(&self, query: &AggregationQuery) -> Vec<DiscountRangeRow> {
        let mut groups: BTreeMap<DiscountBucket, (u64, i64)> = BTreeMap::new();
        for p in self.promotions(&query.promotions) {
            let Some(bucket) = DiscountBucket::from_fraction(p.discount_percentage) else {
                continue;
            };
            let (count, days) = groups.entry(bucket).or_default();
            *count += 1;
            *days += p.duration_days();
        }

        groups
            .into_iter()
            .map(|(discount_range, (nb_promotions, total_days))| DiscountRangeRow {
                discount_range,
                nb_promotions,
                total_days,
            })
            .collect()
    }

    fn region_promotions(&self, query: &AggregationQuery) -> Vec<RegionPromotionRow> {
        let keys = query.promotions.restricted_to(&[Column::Region]);
        let mut groups: BTreeMap<&str, PromoGroup<'_>> = self
            .promotions(&keys)
            .map(|p| (p.region.as_str(), PromoGroup::default()))
            .collect();

        for p in self.promotions(&query.promotions) {
            groups.entry(p.region.as_str()).or_default().push(p);
        }

        groups
            .into_iter()
            .map(|(region, group)| RegionPromotionRow {
                region: region.to_string(),
                nb_promotions: group.ids.len() as u64,
                avg_discount_pct: group.discount.mean().map(to_percent),
                nb_categories: group.categories.len() as u64,
            })
            .collect()
    }

    // ─── Sales ──────────────────────────────────────────────────────────

    fn monthly_sales(&self, query: &AggregationQuery) -> Vec<MonthlySalesRow> {
        let mut groups: BTreeMap<(NaiveDate, &str), Agg> = BTreeMap::new();
        for t in self.transactions(&query.transactions) {
            let Some(month) = t.date.with_day(1) else {
                continue;
            };
            groups.entry((month, t.region.as_str())).or_default().push(t.amount);
        }

        groups
            .into_iter()
            .map(|((month, region), sales)| MonthlySalesRow {
                month,
                region: region.to_string(),
                nb_transactions: sales.count,
                total_sales: sales.sum,
                avg_transaction_value: sales.mean(),
            })
            .collect()
    }

    fn region_sales(&self, query: &AggregationQuery) -> Vec<RegionSalesRow> {
        let keys = query
            .transactions
            .restricted_to(&[Column::Region, Column::TransactionType]);
        let mut groups: BTreeMap<&str, Agg> = self
            .transactions(&keys)
            .map(|t| (t.region.as_str(), Agg::default()))
            .collect();

        for t in self.transactions(&query.transactions) {
            groups.entry(t.region.as_str()).or_default().push(t.amount);
        }

        groups
            .into_iter()
            .map(|(region, sales)| RegionSalesRow {
                region: region.to_string(),
                nb_transactions: sales.count,
                total_sales: sales.sum,
                avg_transaction_value: sales.mean(),
            })
            .collect()
    }

    fn day_of_week_sales(&self, query: &AggregationQuery) -> Vec<DayOfWeekSalesRow> {
        let mut groups: BTreeMap<(u32, &str), (Weekday, Agg)> = BTreeMap::new();
        for t in self.transactions(&query.transactions) {
            let weekday = t.date.weekday();
            let (_, sales) = groups
                .entry((weekday.num_days_from_sunday(), t.region.as_str()))
                .or_insert((weekday, Agg::default()));
            sales.push(t.amount);
        }

        groups
            .into_iter()
            .map(|((day_num, region), (weekday, sales))| DayOfWeekSalesRow {
                day_of_week: day_name(weekday).to_string(),
                day_num,
                region: region.to_string(),
                nb_transactions: sales.count,
                total_sales: sales.sum,
                avg_transaction_value: sales.mean(),
            })
            .collect()
    }
}

fn into_raw<T: Serialize>(
    mut rows: Vec<T>,
    order: fn(&T, &T) -> std::cmp::Ordering,
    limit: Option<usize>,
) -> InsightResult<Vec<RawRow>> {
    rows.sort_by(order);
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    rows.iter()
        .map(|row| match serde_json::to_value(row)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(InsightError::Store(format!(
                "row did not serialize to an object: {other}"
            ))),
        })
        .collect()
}

impl TabularStore for InMemoryWarehouse {
    fn execute(&self, query: &AggregationQuery) -> InsightResult<Vec<RawRow>> {
        metrics::counter!("warehouse.queries").increment(1);
        let limit = query.limit;
        let rows = match query.template {
            TemplateKind::CampaignRoi => {
                into_raw(self.campaign_roi(query), CampaignRoiRow::canonical_cmp, limit)
            }
            TemplateKind::CampaignTypePerformance => {
                into_raw(self.campaign_types(query), CampaignTypeRow::canonical_cmp, limit)
            }
            TemplateKind::AudiencePerformance => {
                into_raw(self.audiences(query), AudienceRow::canonical_cmp, limit)
            }
            TemplateKind::PromotionImpact => into_raw(
                self.promotion_impact(query),
                PromotionImpactRow::canonical_cmp,
                limit,
            ),
            TemplateKind::CategorySensitivity => into_raw(
                self.category_sensitivity(query),
                CategorySensitivityRow::canonical_cmp,
                limit,
            ),
            TemplateKind::DiscountDistribution => into_raw(
                self.discount_distribution(query),
                DiscountRangeRow::canonical_cmp,
                limit,
            ),
            TemplateKind::RegionPromotions => into_raw(
                self.region_promotions(query),
                RegionPromotionRow::canonical_cmp,
                limit,
            ),
            TemplateKind::MonthlySales => {
                into_raw(self.monthly_sales(query), MonthlySalesRow::canonical_cmp, limit)
            }
            TemplateKind::RegionSales => {
                into_raw(self.region_sales(query), RegionSalesRow::canonical_cmp, limit)
            }
            TemplateKind::DayOfWeekSales => into_raw(
                self.day_of_week_sales(query),
                DayOfWeekSalesRow::canonical_cmp,
                limit,
            ),
        }?;

        debug!(template = %query.template, rows = rows.len(), "Warehouse query executed");
        Ok(rows)
    }

    fn distinct_values(&self, source: OptionSource) -> InsightResult<Vec<String>> {
        let data = &self.dataset;
        let values: BTreeSet<&str> = match source {
            OptionSource::PromotionRegions => {
                data.promotions.iter().map(|p| p.region.as_str()).collect()
            }
            OptionSource::PromotionCategories => data
                .promotions
                .iter()
                .map(|p| p.product_category.as_str())
                .collect(),
            OptionSource::PromotionTypes => data
                .promotions
                .iter()
                .map(|p| p.promotion_type.as_str())
                .collect(),
            OptionSource::SaleRegions => data
                .transactions
                .iter()
                .filter(|t| t.is_sale())
                .map(|t| t.region.as_str())
                .collect(),
            OptionSource::PaymentMethods => data
                .transactions
                .iter()
                .filter(|t| t.is_sale())
                .map(|t| t.payment_method.as_str())
                .collect(),
            OptionSource::CampaignRegions => {
                data.campaigns.iter().map(|c| c.region.as_str()).collect()
            }
        };

        Ok(values
            .into_iter()
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::{self, *};
    use insight_core::{DiscountRange, FilterCriteria};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(
        id: &str,
        region: &str,
        day: NaiveDate,
        amount: f64,
        kind: &str,
        method: &str,
    ) -> Transaction {
        Transaction {
            id: id.into(),
            region: region.into(),
            date: day,
            amount,
            transaction_type: kind.into(),
            payment_method: method.into(),
        }
    }

    fn campaign(id: &str, region: &str, budget: f64, conversion: f64) -> Campaign {
        Campaign {
            id: id.into(),
            name: format!("Campaign {id}"),
            campaign_type: "Email".into(),
            region: region.into(),
            budget,
            reach: 1_000,
            conversion_rate: conversion,
            start_date: date(2024, 1, 1),
            end_date: date(2024, 1, 31),
            target_audience: Some("Young Adults".into()),
        }
    }

    fn promo(
        id: &str,
        region: &str,
        category: &str,
        discount: f64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Promotion {
        Promotion {
            id: id.into(),
            region: region.into(),
            product_category: category.into(),
            promotion_type: "Flash".into(),
            discount_percentage: discount,
            start_date: start,
            end_date: end,
        }
    }

    fn close(value: MetricValue, expected: f64) -> bool {
        value.value().is_some_and(|v| (v - expected).abs() < 1e-9)
    }

    fn warehouse() -> InMemoryWarehouse {
        InMemoryWarehouse::new(Dataset {
            transactions: vec![
                tx("t1", "Nord", date(2024, 1, 7), 1000.0, "Sale", "Card"),
                tx("t2", "Nord", date(2024, 1, 8), 1500.0, "Sale", "Cash"),
                tx("t3", "Nord", date(2024, 1, 9), 9999.0, "Refund", "Card"),
                tx("t4", "Sud", date(2024, 2, 3), 100.0, "Sale", "Card"),
                tx("t5", "Est", date(2024, 1, 10), 40.0, "Sale", "Cash"),
            ],
            campaigns: vec![
                campaign("A", "Nord", 1000.0, 0.05),
                campaign("B", "Sud", 500.0, 0.10),
                campaign("C", "Nord", 0.0, 0.02),
            ],
            promotions: vec![
                promo("p1", "Nord", "Epices", 0.25, date(2024, 1, 1), date(2024, 1, 7)),
                promo("p2", "Nord", "Epices", 0.15, date(2024, 1, 5), date(2024, 1, 20)),
                promo("p3", "Sud", "Boissons", 0.45, date(2024, 2, 1), date(2024, 2, 11)),
                promo("p4", "Est", "Epices", 0.05, date(2024, 3, 1), date(2024, 3, 3)),
            ],
        })
    }

    fn criteria() -> FilterCriteria {
        FilterCriteria::new()
            .with_regions(["Nord", "Sud", "Est"])
            .with_categories(["Epices", "Boissons"])
            .with_promotion_types(["Flash"])
            .with_payment_methods(["Card", "Cash"])
    }

    #[test]
    fn test_campaigns_without_sales_remain_with_zero_totals() {
        let store = warehouse();
        let rows = templates::run(&CampaignRoi { limit: Some(50) }, &store, &criteria())
            .unwrap()
            .into_rows()
            .unwrap();

        let ids: Vec<_> = rows.iter().map(|r| r.campaign_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(rows[0].nb_sales, 2);
        assert!((rows[0].total_sales - 2500.0).abs() < f64::EPSILON);
        assert_eq!(rows[0].roi_ratio, MetricValue::Value(2.5));
        assert_eq!(rows[1].nb_sales, 0);
        assert_eq!(rows[1].roi_ratio, MetricValue::Value(0.0));
        assert_eq!(rows[2].roi_ratio, MetricValue::Undefined);
        assert!((rows[0].conversion_rate_pct - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_refunds_never_count_as_sales() {
        let store = warehouse();
        let rows = templates::run(&RegionSales, &store, &criteria())
            .unwrap()
            .into_rows()
            .unwrap();
        let nord = rows.iter().find(|r| r.region == "Nord").unwrap();
        assert_eq!(nord.nb_transactions, 2);
        assert!((nord.total_sales - 2500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_region_sales_keeps_selected_regions_with_zero_filtered_sales() {
        let store = warehouse();
        let criteria = criteria().with_min_amount(500.0);
        let rows = templates::run(&RegionSales, &store, &criteria)
            .unwrap()
            .into_rows()
            .unwrap();

        let regions: Vec<_> = rows.iter().map(|r| r.region.as_str()).collect();
        assert_eq!(regions, vec!["Nord", "Est", "Sud"]);
        let sud = rows.iter().find(|r| r.region == "Sud").unwrap();
        assert_eq!(sud.nb_transactions, 0);
        assert_eq!(sud.avg_transaction_value, MetricValue::Undefined);
    }

    #[test]
    fn test_promotion_impact_counts_each_sale_once() {
        let store = warehouse();
        let rows = templates::run(&PromotionImpact, &store, &criteria())
            .unwrap()
            .into_rows()
            .unwrap();

        // t1 sits in both p1 and p2 windows but is counted once.
        let with = rows
            .iter()
            .find(|r| r.promo_status == PromoStatus::WithPromotion)
            .unwrap();
        assert_eq!(with.nb_transactions, 3);
        assert!((with.total_sales - 2600.0).abs() < f64::EPSILON);

        let total: u64 = rows.iter().map(|r| r.nb_transactions).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn test_promotion_impact_honours_discount_range() {
        let store = warehouse();
        let criteria = criteria().with_discount_range(DiscountRange::new(0.20, 0.30));
        let rows = templates::run(&PromotionImpact, &store, &criteria)
            .unwrap()
            .into_rows()
            .unwrap();

        // Only p1 (Nord, Jan 1-7) survives; t1 on Jan 7 is its last day.
        let with = rows
            .iter()
            .find(|r| r.promo_status == PromoStatus::WithPromotion)
            .unwrap();
        assert_eq!(with.nb_transactions, 1);
    }

    #[test]
    fn test_category_sensitivity_keeps_keys_outside_discount_range() {
        let store = warehouse();
        let criteria = criteria().with_discount_range(DiscountRange::new(0.10, 0.30));
        let rows = templates::run(&CategorySensitivity, &store, &criteria)
            .unwrap()
            .into_rows()
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].product_category, "Epices");
        assert_eq!(rows[0].region, "Nord");
        assert_eq!(rows[0].nb_promotions, 2);
        assert!(close(rows[0].avg_discount_pct, 20.0));
        assert!(close(rows[0].min_discount_pct, 15.0));
        assert!(close(rows[0].max_discount_pct, 25.0));
        assert!(close(rows[0].avg_promo_duration_days, 10.5));

        let sud = rows.iter().find(|r| r.region == "Sud").unwrap();
        assert_eq!(sud.nb_promotions, 0);
        assert_eq!(sud.avg_discount_pct, MetricValue::Undefined);
    }

    #[test]
    fn test_promotions_on_the_range_edges_are_kept() {
        let store = warehouse();
        // p2 sits on the lower bound and p1 on the upper one.
        let criteria = criteria().with_discount_range(DiscountRange::new(0.15, 0.25));

        let categories = templates::run(&CategorySensitivity, &store, &criteria)
            .unwrap()
            .into_rows()
            .unwrap();
        let epices = categories
            .iter()
            .find(|r| r.product_category == "Epices" && r.region == "Nord")
            .unwrap();
        assert_eq!(epices.nb_promotions, 2);
        assert!(close(epices.min_discount_pct, 15.0));
        assert!(close(epices.max_discount_pct, 25.0));

        let regions = templates::run(&RegionPromotions, &store, &criteria)
            .unwrap()
            .into_rows()
            .unwrap();
        let nord = regions.iter().find(|r| r.region == "Nord").unwrap();
        assert_eq!(nord.nb_promotions, 2);

        let narrowed = criteria.with_discount_range(DiscountRange::new(0.16, 0.25));
        let regions = templates::run(&RegionPromotions, &store, &narrowed)
            .unwrap()
            .into_rows()
            .unwrap();
        let nord = regions.iter().find(|r| r.region == "Nord").unwrap();
        assert_eq!(nord.nb_promotions, 1);
    }

    #[test]
    fn test_discount_distribution_is_sparse_and_ignores_range() {
        let store = warehouse();
        let criteria = criteria().with_discount_range(DiscountRange::new(0.9, 1.0));
        let rows = templates::run(&DiscountDistribution, &store, &criteria)
            .unwrap()
            .into_rows()
            .unwrap();

        let buckets: Vec<_> = rows.iter().map(|r| r.discount_range).collect();
        assert_eq!(
            buckets,
            vec![
                DiscountBucket::Under10,
                DiscountBucket::From10To19,
                DiscountBucket::From20To29,
                DiscountBucket::From40,
            ]
        );
        let forty = rows.last().unwrap();
        assert_eq!(forty.total_days, 10);
    }

    #[test]
    fn test_region_promotions_counts_distinct_categories() {
        let store = warehouse();
        let rows = templates::run(&RegionPromotions, &store, &criteria())
            .unwrap()
            .into_rows()
            .unwrap();
        assert_eq!(rows[0].region, "Nord");
        assert_eq!(rows[0].nb_promotions, 2);
        assert_eq!(rows[0].nb_categories, 1);
    }

    #[test]
    fn test_day_of_week_is_sunday_first() {
        let store = warehouse();
        let rows = templates::run(&DayOfWeekSales, &store, &criteria())
            .unwrap()
            .into_rows()
            .unwrap();

        // 2024-01-07 was a Sunday.
        assert_eq!(rows[0].day_num, 0);
        assert_eq!(rows[0].day_of_week, "Sun");
        assert_eq!(rows[0].region, "Nord");
        assert!(rows.windows(2).all(|w| w[0].day_num <= w[1].day_num));
    }

    #[test]
    fn test_monthly_sales_groups_by_first_of_month() {
        let store = warehouse();
        let rows = templates::run(&MonthlySales, &store, &criteria())
            .unwrap()
            .into_rows()
            .unwrap();
        assert_eq!(rows[0].month, date(2024, 1, 1));
        assert_eq!(rows.last().unwrap().month, date(2024, 2, 1));
        let total: f64 = rows.iter().map(|r| r.total_sales).sum();
        assert!((total - 2640.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_audience_and_type_exclude_filtered_campaigns() {
        let store = warehouse();
        let types = templates::run(&CampaignTypePerformance, &store, &criteria())
            .unwrap()
            .into_rows()
            .unwrap();
        // Campaign C has no budget and is excluded.
        assert_eq!(types[0].nb_campaigns, 2);

        let audiences = templates::run(&AudiencePerformance { limit: 15 }, &store, &criteria())
            .unwrap()
            .into_rows()
            .unwrap();
        assert_eq!(audiences[0].nb_campaigns, 3);
    }

    #[test]
    fn test_distinct_values_are_sorted_and_sale_only() {
        let store = warehouse();
        let regions = store.distinct_values(OptionSource::SaleRegions).unwrap();
        assert_eq!(regions, vec!["Est", "Nord", "Sud"]);
        let categories = store
            .distinct_values(OptionSource::PromotionCategories)
            .unwrap();
        assert_eq!(categories, vec!["Boissons", "Epices"]);
    }
}
