//! The tabular-query service the engine runs its templates against.

use crate::templates::AggregationQuery;
use insight_core::{FilterCriteria, InsightResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One result row, keyed by column name.
pub type RawRow = serde_json::Map<String, serde_json::Value>;

/// Where a filter widget's option list comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionSource {
    PromotionRegions,
    PromotionCategories,
    PromotionTypes,
    SaleRegions,
    PaymentMethods,
    CampaignRegions,
}

impl OptionSource {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PromotionRegions => "promotion_regions",
            Self::PromotionCategories => "promotion_categories",
            Self::PromotionTypes => "promotion_types",
            Self::SaleRegions => "sale_regions",
            Self::PaymentMethods => "payment_methods",
            Self::CampaignRegions => "campaign_regions",
        }
    }

    /// Query listing the distinct non-null values, sorted ascending.
    pub fn sql(&self) -> &'static str {
        match self {
            Self::PromotionRegions => {
                "SELECT DISTINCT region FROM promotions_clean WHERE region IS NOT NULL ORDER BY region"
            }
            Self::PromotionCategories => {
                "SELECT DISTINCT product_category FROM promotions_clean \
                 WHERE product_category IS NOT NULL ORDER BY product_category"
            }
            Self::PromotionTypes => {
                "SELECT DISTINCT promotion_type FROM promotions_clean \
                 WHERE promotion_type IS NOT NULL ORDER BY promotion_type"
            }
            Self::SaleRegions => {
                "SELECT DISTINCT region FROM financial_transactions_clean \
                 WHERE region IS NOT NULL AND transaction_type = 'Sale' ORDER BY region"
            }
            Self::PaymentMethods => {
                "SELECT DISTINCT payment_method FROM financial_transactions_clean \
                 WHERE payment_method IS NOT NULL AND transaction_type = 'Sale' ORDER BY payment_method"
            }
            Self::CampaignRegions => {
                "SELECT DISTINCT region FROM marketing_campaigns_clean WHERE region IS NOT NULL ORDER BY region"
            }
        }
    }
}

/// Executes aggregation queries and returns rows.
///
/// Implementations must honor the predicate semantics of the query (bound
/// parameters, inclusive ranges) and the outer-join inclusion rules of each
/// template. Failures are returned as-is; the engine never retries.
pub trait TabularStore: Send + Sync {
    fn execute(&self, query: &AggregationQuery) -> InsightResult<Vec<RawRow>>;

    fn distinct_values(&self, source: OptionSource) -> InsightResult<Vec<String>>;
}

/// Criteria with every available option selected, the dashboards' initial
/// state. Regions are the union of campaign, promotion and sale regions.
pub fn select_all_options<S: TabularStore + ?Sized>(store: &S) -> InsightResult<FilterCriteria> {
    let mut regions = BTreeSet::new();
    for source in [
        OptionSource::CampaignRegions,
        OptionSource::PromotionRegions,
        OptionSource::SaleRegions,
    ] {
        regions.extend(store.distinct_values(source)?);
    }

    Ok(FilterCriteria {
        regions,
        categories: store
            .distinct_values(OptionSource::PromotionCategories)?
            .into_iter()
            .collect(),
        promotion_types: store
            .distinct_values(OptionSource::PromotionTypes)?
            .into_iter()
            .collect(),
        payment_methods: store
            .distinct_values(OptionSource::PaymentMethods)?
            .into_iter()
            .collect(),
        ..FilterCriteria::default()
    })
}

impl<S: TabularStore + ?Sized> TabularStore for std::sync::Arc<S> {
    fn execute(&self, query: &AggregationQuery) -> InsightResult<Vec<RawRow>> {
        (**self).execute(query)
    }

    fn distinct_values(&self, source: OptionSource) -> InsightResult<Vec<String>> {
        (**self).distinct_values(source)
    }
}
