//! Metric query templates: one parameterized aggregation per analytical
//! question, all built through the same predicate builder.

use crate::predicate::{
    quote_literal, BoundSql, Column, NoData, Predicate, PredicateBuilder, SqlWriter,
};
use crate::rows::*;
use crate::store::TabularStore;
use insight_core::{
    Dimension, DiscountBucket, FilterCriteria, InsightError, InsightResult, SALE_TRANSACTION_TYPE,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, warn};

// ─── Types ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    CampaignRoi,
    CampaignTypePerformance,
    AudiencePerformance,
    PromotionImpact,
    CategorySensitivity,
    DiscountDistribution,
    RegionPromotions,
    MonthlySales,
    RegionSales,
    DayOfWeekSales,
}

impl TemplateKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CampaignRoi => "campaign_roi",
            Self::CampaignTypePerformance => "campaign_type_performance",
            Self::AudiencePerformance => "audience_performance",
            Self::PromotionImpact => "promotion_impact",
            Self::CategorySensitivity => "category_sensitivity",
            Self::DiscountDistribution => "discount_distribution",
            Self::RegionPromotions => "region_promotions",
            Self::MonthlySales => "monthly_sales",
            Self::RegionSales => "region_sales",
            Self::DayOfWeekSales => "day_of_week_sales",
        }
    }

    /// Selections that must be non-empty for the template to run.
    pub fn required_dimensions(&self) -> &'static [Dimension] {
        match self {
            Self::CampaignRoi | Self::CampaignTypePerformance | Self::AudiencePerformance => {
                &[Dimension::Region]
            }
            Self::PromotionImpact => &[Dimension::Region, Dimension::Category],
            Self::CategorySensitivity | Self::DiscountDistribution | Self::RegionPromotions => {
                &[Dimension::Region, Dimension::Category, Dimension::PromotionType]
            }
            Self::MonthlySales | Self::RegionSales | Self::DayOfWeekSales => {
                &[Dimension::Region, Dimension::PaymentMethod]
            }
        }
    }
}

impl std::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A fully bound aggregation request.
///
/// Carries the per-table predicates for stores that evaluate them directly
/// and the equivalent parameterized SQL for stores that speak SQL.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationQuery {
    pub template: TemplateKind,
    pub transactions: Predicate,
    pub campaigns: Predicate,
    pub promotions: Predicate,
    pub limit: Option<usize>,
    pub bound: BoundSql,
}

impl AggregationQuery {
    fn new(template: TemplateKind, bound: BoundSql) -> Self {
        Self {
            template,
            transactions: Predicate::always(),
            campaigns: Predicate::always(),
            promotions: Predicate::always(),
            limit: None,
            bound,
        }
    }

    /// Memoization key. Every applied filter value is a bound parameter and
    /// the limit is part of the SQL text, so the key changes whenever
    /// anything affecting the result does.
    pub fn cache_key(&self) -> String {
        let params = serde_json::to_string(&self.bound.params).unwrap_or_default();
        format!("{}|{}|{}", self.template.name(), self.bound.sql, params)
    }
}

/// Rows for the criteria, or the explicit "no data" sentinel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum QueryOutcome<T> {
    Rows(Vec<T>),
    NoData(NoData),
}

impl<T> QueryOutcome<T> {
    pub fn rows(&self) -> Option<&[T]> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::NoData(_) => None,
        }
    }

    pub fn into_rows(self) -> Option<Vec<T>> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::NoData(_) => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData(_))
    }

    /// Rows, or an empty slice for the sentinel.
    pub fn rows_or_empty(&self) -> &[T] {
        self.rows().unwrap_or(&[])
    }

    pub fn map<U>(self, f: impl FnOnce(Vec<T>) -> Vec<U>) -> QueryOutcome<U> {
        match self {
            Self::Rows(rows) => QueryOutcome::Rows(f(rows)),
            Self::NoData(no_data) => QueryOutcome::NoData(no_data),
        }
    }
}

/// An aggregation definition: how to bind criteria and how to order rows.
pub trait MetricTemplate {
    type Row: DeserializeOwned + TabularRow;

    fn kind(&self) -> TemplateKind;

    fn build(&self, criteria: &FilterCriteria) -> Result<AggregationQuery, NoData>;

    fn order(a: &Self::Row, b: &Self::Row) -> Ordering;

    fn limit(&self) -> Option<usize> {
        None
    }
}

/// Bind, execute, decode, then enforce the template's ordering and limit.
pub fn run<T, S>(
    template: &T,
    store: &S,
    criteria: &FilterCriteria,
) -> InsightResult<QueryOutcome<T::Row>>
where
    T: MetricTemplate,
    S: TabularStore + ?Sized,
{
    let query = match template.build(criteria) {
        Ok(query) => query,
        Err(no_data) => {
            debug!(
                template = %template.kind(),
                missing = ?no_data.missing,
                "Skipping template, empty selection"
            );
            return Ok(QueryOutcome::NoData(no_data));
        }
    };

    let raw = store.execute(&query)?;
    let mut rows = raw
        .into_iter()
        .map(|row| {
            serde_json::from_value::<T::Row>(serde_json::Value::Object(row)).map_err(|e| {
                warn!(template = %template.kind(), error = %e, "Undecodable row from store");
                InsightError::MalformedResponse {
                    template: template.kind().name().to_string(),
                    reason: e.to_string(),
                }
            })
        })
        .collect::<InsightResult<Vec<_>>>()?;

    rows.sort_by(T::order);
    if let Some(limit) = template.limit() {
        rows.truncate(limit);
    }

    debug!(template = %template.kind(), rows = rows.len(), "Template executed");
    Ok(QueryOutcome::Rows(rows))
}

// ─── Shared predicate construction ──────────────────────────────────────────

fn sale_transactions() -> PredicateBuilder {
    PredicateBuilder::new().equals(Column::TransactionType, SALE_TRANSACTION_TYPE)
}

fn regional_campaigns(criteria: &FilterCriteria) -> PredicateBuilder {
    PredicateBuilder::new().require_any_of(Dimension::Region, Column::Region, &criteria.regions)
}

fn scoped_promotions(criteria: &FilterCriteria) -> PredicateBuilder {
    PredicateBuilder::new()
        .require_any_of(Dimension::Region, Column::Region, &criteria.regions)
        .require_any_of(
            Dimension::Category,
            Column::ProductCategory,
            &criteria.categories,
        )
        .require_any_of(
            Dimension::PromotionType,
            Column::PromotionType,
            &criteria.promotion_types,
        )
}

fn filtered_sales(criteria: &FilterCriteria) -> Result<Predicate, NoData> {
    sale_transactions()
        .require_any_of(Dimension::Region, Column::Region, &criteria.regions)
        .require_any_of(
            Dimension::PaymentMethod,
            Column::PaymentMethod,
            &criteria.payment_methods,
        )
        .at_least(Column::Amount, criteria.min_amount)
        .build()
}

/// Combine two predicate results, reporting every missing dimension once.
fn both(
    a: Result<Predicate, NoData>,
    b: Result<Predicate, NoData>,
) -> Result<(Predicate, Predicate), NoData> {
    match (a, b) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (a, b) => {
            let mut missing = Vec::new();
            for dimension in [a.err(), b.err()]
                .into_iter()
                .flatten()
                .flat_map(|n| n.missing)
            {
                if !missing.contains(&dimension) {
                    missing.push(dimension);
                }
            }
            missing.sort();
            Err(NoData { missing })
        }
    }
}

enum Part<'a> {
    Text(&'a str),
    Filter(&'a Predicate, &'a str),
}

fn compose(parts: &[Part<'_>]) -> BoundSql {
    let mut sql = SqlWriter::new();
    for part in parts {
        match part {
            Part::Text(text) => sql.push_str(text),
            Part::Filter(predicate, alias) => predicate.render_into(Some(alias), &mut sql),
        }
    }
    sql.finish()
}

fn with_limit(mut bound: BoundSql, limit: Option<usize>) -> BoundSql {
    if let Some(limit) = limit {
        bound.sql.push_str(&format!("\nLIMIT {limit}"));
    }
    bound
}

fn discount_bucket_case(column: &str) -> String {
    let mut case = String::from("CASE");
    for (bucket, boundary) in DiscountBucket::ALL.iter().zip(DiscountBucket::BOUNDARIES) {
        case.push_str(&format!(
            " WHEN {column} < {boundary} THEN {}",
            quote_literal(bucket.label())
        ));
    }
    case.push_str(&format!(
        " ELSE {} END",
        quote_literal(DiscountBucket::From40.label())
    ));
    case
}

// ─── Marketing templates ────────────────────────────────────────────────────

/// Campaign ROI: sales attributed by region and active window, ROI ratio
/// descending with undefined ratios last. `None` returns every campaign.
#[derive(Debug, Clone)]
pub struct CampaignRoi {
    pub limit: Option<usize>,
}

impl MetricTemplate for CampaignRoi {
    type Row = CampaignRoiRow;

    fn kind(&self) -> TemplateKind {
        TemplateKind::CampaignRoi
    }

    fn build(&self, criteria: &FilterCriteria) -> Result<AggregationQuery, NoData> {
        let campaigns = regional_campaigns(criteria).build()?;
        let transactions = sale_transactions().build()?;

        let bound = compose(&[
            Part::Text(
                "WITH campaign_sales AS (\n\
                 SELECT mc.campaign_id, mc.campaign_name, mc.campaign_type, mc.region, \
                 mc.budget, mc.reach, mc.conversion_rate, \
                 COUNT(ft.transaction_id) AS nb_sales, \
                 COALESCE(SUM(ft.amount), 0) AS total_sales\n\
                 FROM marketing_campaigns_clean mc\n\
                 LEFT JOIN financial_transactions_clean ft\n\
                 ON mc.region = ft.region\n\
                 AND ft.transaction_date BETWEEN mc.start_date AND mc.end_date\n\
                 AND ",
            ),
            Part::Filter(&transactions, "ft"),
            Part::Text("\nWHERE "),
            Part::Filter(&campaigns, "mc"),
            Part::Text(
                "\nGROUP BY mc.campaign_id, mc.campaign_name, mc.campaign_type, \
                 mc.region, mc.budget, mc.reach, mc.conversion_rate\n)\n\
                 SELECT campaign_id, campaign_name, campaign_type, region, budget, reach, \
                 conversion_rate * 100 AS conversion_rate_pct, nb_sales, total_sales, \
                 total_sales / NULLIF(budget, 0) AS roi_ratio\n\
                 FROM campaign_sales\n\
                 ORDER BY roi_ratio DESC NULLS LAST, campaign_id",
            ),
        ]);

        let mut query = AggregationQuery::new(self.kind(), with_limit(bound, self.limit));
        query.campaigns = campaigns;
        query.transactions = transactions;
        query.limit = self.limit;
        Ok(query)
    }

    fn order(a: &Self::Row, b: &Self::Row) -> Ordering {
        CampaignRoiRow::canonical_cmp(a, b)
    }

    fn limit(&self) -> Option<usize> {
        self.limit
    }
}

/// Campaign-type performance over campaigns with a positive budget.
#[derive(Debug, Clone, Default)]
pub struct CampaignTypePerformance;

impl MetricTemplate for CampaignTypePerformance {
    type Row = CampaignTypeRow;

    fn kind(&self) -> TemplateKind {
        TemplateKind::CampaignTypePerformance
    }

    fn build(&self, criteria: &FilterCriteria) -> Result<AggregationQuery, NoData> {
        let campaigns = regional_campaigns(criteria)
            .greater_than(Column::Budget, 0.0)
            .build()?;

        let bound = compose(&[
            Part::Text(
                "SELECT mc.campaign_type, COUNT(*) AS nb_campaigns, \
                 SUM(mc.budget) AS total_budget, AVG(mc.budget) AS avg_budget, \
                 AVG(mc.conversion_rate) * 100 AS avg_conversion_pct, \
                 AVG(mc.reach) AS avg_reach\n\
                 FROM marketing_campaigns_clean mc\n\
                 WHERE ",
            ),
            Part::Filter(&campaigns, "mc"),
            Part::Text(
                "\nGROUP BY mc.campaign_type\n\
                 ORDER BY avg_conversion_pct DESC NULLS LAST, mc.campaign_type",
            ),
        ]);

        let mut query = AggregationQuery::new(self.kind(), bound);
        query.campaigns = campaigns;
        Ok(query)
    }

    fn order(a: &Self::Row, b: &Self::Row) -> Ordering {
        CampaignTypeRow::canonical_cmp(a, b)
    }
}

/// Conversion and budget by target audience.
#[derive(Debug, Clone)]
pub struct AudiencePerformance {
    pub limit: usize,
}

impl MetricTemplate for AudiencePerformance {
    type Row = AudienceRow;

    fn kind(&self) -> TemplateKind {
        TemplateKind::AudiencePerformance
    }

    fn build(&self, criteria: &FilterCriteria) -> Result<AggregationQuery, NoData> {
        let campaigns = regional_campaigns(criteria)
            .not_null(Column::TargetAudience)
            .build()?;

        let bound = compose(&[
            Part::Text(
                "SELECT mc.target_audience, COUNT(*) AS nb_campaigns, \
                 AVG(mc.conversion_rate) * 100 AS avg_conversion_pct, \
                 SUM(mc.budget) AS total_budget\n\
                 FROM marketing_campaigns_clean mc\n\
                 WHERE ",
            ),
            Part::Filter(&campaigns, "mc"),
            Part::Text(
                "\nGROUP BY mc.target_audience\n\
                 ORDER BY avg_conversion_pct DESC NULLS LAST, mc.target_audience",
            ),
        ]);

        let mut query = AggregationQuery::new(self.kind(), with_limit(bound, Some(self.limit)));
        query.campaigns = campaigns;
        query.limit = Some(self.limit);
        Ok(query)
    }

    fn order(a: &Self::Row, b: &Self::Row) -> Ordering {
        AudienceRow::canonical_cmp(a, b)
    }

    fn limit(&self) -> Option<usize> {
        Some(self.limit)
    }
}

// ─── Promotion templates ────────────────────────────────────────────────────

/// Sales in the selected regions split by whether a filtered promotion was
/// active in the same region on the transaction date.
#[derive(Debug, Clone, Default)]
pub struct PromotionImpact;

impl MetricTemplate for PromotionImpact {
    type Row = PromotionImpactRow;

    fn kind(&self) -> TemplateKind {
        TemplateKind::PromotionImpact
    }

    fn build(&self, criteria: &FilterCriteria) -> Result<AggregationQuery, NoData> {
        let (transactions, promotions) = both(
            sale_transactions()
                .require_any_of(Dimension::Region, Column::Region, &criteria.regions)
                .build(),
            PredicateBuilder::new()
                .require_any_of(Dimension::Region, Column::Region, &criteria.regions)
                .require_any_of(
                    Dimension::Category,
                    Column::ProductCategory,
                    &criteria.categories,
                )
                .between(Column::DiscountPercentage, criteria.discount_range)
                .build(),
        )?;

        let bound = compose(&[
            Part::Text(
                "WITH sales_promo_overlap AS (\n\
                 SELECT ft.amount, CASE WHEN EXISTS (\n\
                 SELECT 1 FROM promotions_clean p\n\
                 WHERE p.region = ft.region\n\
                 AND ft.transaction_date BETWEEN p.start_date AND p.end_date\n\
                 AND ",
            ),
            Part::Filter(&promotions, "p"),
            Part::Text(
                "\n) THEN 'Avec promotion' ELSE 'Sans promotion' END AS promo_status\n\
                 FROM financial_transactions_clean ft\n\
                 WHERE ",
            ),
            Part::Filter(&transactions, "ft"),
            Part::Text(
                "\n)\n\
                 SELECT promo_status, COUNT(*) AS nb_transactions, \
                 SUM(amount) AS total_sales, AVG(amount) AS avg_transaction_value\n\
                 FROM sales_promo_overlap\n\
                 GROUP BY promo_status\n\
                 ORDER BY total_sales DESC, promo_status",
            ),
        ]);

        let mut query = AggregationQuery::new(self.kind(), bound);
        query.transactions = transactions;
        query.promotions = promotions;
        Ok(query)
    }

    fn order(a: &Self::Row, b: &Self::Row) -> Ordering {
        PromotionImpactRow::canonical_cmp(a, b)
    }
}

/// Promotion depth and duration per category and region.
#[derive(Debug, Clone, Default)]
pub struct CategorySensitivity;

impl MetricTemplate for CategorySensitivity {
    type Row = CategorySensitivityRow;

    fn kind(&self) -> TemplateKind {
        TemplateKind::CategorySensitivity
    }

    fn build(&self, criteria: &FilterCriteria) -> Result<AggregationQuery, NoData> {
        let promotions = scoped_promotions(criteria)
            .between(Column::DiscountPercentage, criteria.discount_range)
            .build()?;
        let keys = promotions.restricted_to(&[Column::Region, Column::ProductCategory]);

        let bound = compose(&[
            Part::Text(
                "WITH keys AS (\n\
                 SELECT DISTINCT p.product_category, p.region FROM promotions_clean p WHERE ",
            ),
            Part::Filter(&keys, "p"),
            Part::Text(
                "\n), filtered AS (\n\
                 SELECT * FROM promotions_clean p WHERE ",
            ),
            Part::Filter(&promotions, "p"),
            Part::Text(
                "\n)\n\
                 SELECT k.product_category, k.region, \
                 COUNT(DISTINCT f.promotion_id) AS nb_promotions, \
                 AVG(f.discount_percentage) * 100 AS avg_discount_pct, \
                 MIN(f.discount_percentage) * 100 AS min_discount_pct, \
                 MAX(f.discount_percentage) * 100 AS max_discount_pct, \
                 AVG(DATEDIFF(day, f.start_date, f.end_date)) AS avg_promo_duration_days\n\
                 FROM keys k\n\
                 LEFT JOIN filtered f ON f.product_category = k.product_category AND f.region = k.region\n\
                 GROUP BY k.product_category, k.region\n\
                 ORDER BY nb_promotions DESC, k.product_category, k.region",
            ),
        ]);

        let mut query = AggregationQuery::new(self.kind(), bound);
        query.promotions = promotions;
        Ok(query)
    }

    fn order(a: &Self::Row, b: &Self::Row) -> Ordering {
        CategorySensitivityRow::canonical_cmp(a, b)
    }
}

/// Promotion counts per discount bucket. Buckets the full discount spectrum;
/// the discount range filter does not apply.
#[derive(Debug, Clone, Default)]
pub struct DiscountDistribution;

impl MetricTemplate for DiscountDistribution {
    type Row = DiscountRangeRow;

    fn kind(&self) -> TemplateKind {
        TemplateKind::DiscountDistribution
    }

    fn build(&self, criteria: &FilterCriteria) -> Result<AggregationQuery, NoData> {
        let promotions = scoped_promotions(criteria)
            .not_null(Column::DiscountPercentage)
            .build()?;

        let select = format!(
            "SELECT {} AS discount_range, COUNT(*) AS nb_promotions, \
             SUM(DATEDIFF(day, p.start_date, p.end_date)) AS total_days\n\
             FROM promotions_clean p\n\
             WHERE ",
            discount_bucket_case("p.discount_percentage")
        );
        let bound = compose(&[
            Part::Text(&select),
            Part::Filter(&promotions, "p"),
            Part::Text(
                "\nGROUP BY discount_range\n\
                 ORDER BY MIN(p.discount_percentage)",
            ),
        ]);

        let mut query = AggregationQuery::new(self.kind(), bound);
        query.promotions = promotions;
        Ok(query)
    }

    fn order(a: &Self::Row, b: &Self::Row) -> Ordering {
        DiscountRangeRow::canonical_cmp(a, b)
    }
}

/// Promotion activity per region.
#[derive(Debug, Clone, Default)]
pub struct RegionPromotions;

impl MetricTemplate for RegionPromotions {
    type Row = RegionPromotionRow;

    fn kind(&self) -> TemplateKind {
        TemplateKind::RegionPromotions
    }

    fn build(&self, criteria: &FilterCriteria) -> Result<AggregationQuery, NoData> {
        let promotions = scoped_promotions(criteria)
            .between(Column::DiscountPercentage, criteria.discount_range)
            .build()?;
        let keys = promotions.restricted_to(&[Column::Region]);

        let bound = compose(&[
            Part::Text(
                "WITH keys AS (\n\
                 SELECT DISTINCT p.region FROM promotions_clean p WHERE ",
            ),
            Part::Filter(&keys, "p"),
            Part::Text(
                "\n), filtered AS (\n\
                 SELECT * FROM promotions_clean p WHERE ",
            ),
            Part::Filter(&promotions, "p"),
            Part::Text(
                "\n)\n\
                 SELECT k.region, COUNT(DISTINCT f.promotion_id) AS nb_promotions, \
                 AVG(f.discount_percentage) * 100 AS avg_discount_pct, \
                 COUNT(DISTINCT f.product_category) AS nb_categories\n\
                 FROM keys k\n\
                 LEFT JOIN filtered f ON f.region = k.region\n\
                 GROUP BY k.region\n\
                 ORDER BY nb_promotions DESC, k.region",
            ),
        ]);

        let mut query = AggregationQuery::new(self.kind(), bound);
        query.promotions = promotions;
        Ok(query)
    }

    fn order(a: &Self::Row, b: &Self::Row) -> Ordering {
        RegionPromotionRow::canonical_cmp(a, b)
    }
}

// ─── Sales templates ────────────────────────────────────────────────────────

/// Sales per calendar month and region.
#[derive(Debug, Clone, Default)]
pub struct MonthlySales;

impl MetricTemplate for MonthlySales {
    type Row = MonthlySalesRow;

    fn kind(&self) -> TemplateKind {
        TemplateKind::MonthlySales
    }

    fn build(&self, criteria: &FilterCriteria) -> Result<AggregationQuery, NoData> {
        let transactions = filtered_sales(criteria)?;

        let bound = compose(&[
            Part::Text(
                "SELECT DATE_TRUNC('month', ft.transaction_date) AS month, ft.region, \
                 COUNT(*) AS nb_transactions, SUM(ft.amount) AS total_sales, \
                 AVG(ft.amount) AS avg_transaction_value\n\
                 FROM financial_transactions_clean ft\n\
                 WHERE ",
            ),
            Part::Filter(&transactions, "ft"),
            Part::Text(
                "\nGROUP BY month, ft.region\n\
                 ORDER BY month, ft.region",
            ),
        ]);

        let mut query = AggregationQuery::new(self.kind(), bound);
        query.transactions = transactions;
        Ok(query)
    }

    fn order(a: &Self::Row, b: &Self::Row) -> Ordering {
        MonthlySalesRow::canonical_cmp(a, b)
    }
}

/// Sales per region. Selected regions with sales but none passing the
/// payment or amount filters still appear with zero totals.
#[derive(Debug, Clone, Default)]
pub struct RegionSales;

impl MetricTemplate for RegionSales {
    type Row = RegionSalesRow;

    fn kind(&self) -> TemplateKind {
        TemplateKind::RegionSales
    }

    fn build(&self, criteria: &FilterCriteria) -> Result<AggregationQuery, NoData> {
        let transactions = filtered_sales(criteria)?;
        let keys = transactions.restricted_to(&[Column::Region, Column::TransactionType]);

        let bound = compose(&[
            Part::Text(
                "WITH keys AS (\n\
                 SELECT DISTINCT ft.region FROM financial_transactions_clean ft WHERE ",
            ),
            Part::Filter(&keys, "ft"),
            Part::Text(
                "\n), filtered AS (\n\
                 SELECT ft.region, ft.amount FROM financial_transactions_clean ft WHERE ",
            ),
            Part::Filter(&transactions, "ft"),
            Part::Text(
                "\n)\n\
                 SELECT k.region, COUNT(f.amount) AS nb_transactions, \
                 COALESCE(SUM(f.amount), 0) AS total_sales, \
                 AVG(f.amount) AS avg_transaction_value\n\
                 FROM keys k\n\
                 LEFT JOIN filtered f ON f.region = k.region\n\
                 GROUP BY k.region\n\
                 ORDER BY total_sales DESC, k.region",
            ),
        ]);

        let mut query = AggregationQuery::new(self.kind(), bound);
        query.transactions = transactions;
        Ok(query)
    }

    fn order(a: &Self::Row, b: &Self::Row) -> Ordering {
        RegionSalesRow::canonical_cmp(a, b)
    }
}

/// Sales per weekday and region, Sunday first.
#[derive(Debug, Clone, Default)]
pub struct DayOfWeekSales;

impl MetricTemplate for DayOfWeekSales {
    type Row = DayOfWeekSalesRow;

    fn kind(&self) -> TemplateKind {
        TemplateKind::DayOfWeekSales
    }

    fn build(&self, criteria: &FilterCriteria) -> Result<AggregationQuery, NoData> {
        let transactions = filtered_sales(criteria)?;

        let bound = compose(&[
            Part::Text(
                "SELECT DAYNAME(ft.transaction_date) AS day_of_week, \
                 DAYOFWEEK(ft.transaction_date) AS day_num, ft.region, \
                 COUNT(*) AS nb_transactions, SUM(ft.amount) AS total_sales, \
                 AVG(ft.amount) AS avg_transaction_value\n\
                 FROM financial_transactions_clean ft\n\
                 WHERE ",
            ),
            Part::Filter(&transactions, "ft"),
            Part::Text(
                "\nGROUP BY day_of_week, day_num, ft.region\n\
                 ORDER BY day_num, ft.region",
            ),
        ]);

        let mut query = AggregationQuery::new(self.kind(), bound);
        query.transactions = transactions;
        Ok(query)
    }

    fn order(a: &Self::Row, b: &Self::Row) -> Ordering {
        DayOfWeekSalesRow::canonical_cmp(a, b)
    }
}
