//! Sales dashboard view: headline KPIs, monthly and weekday trends, and
//! regional performance.

use crate::derived::{reaggregate, RegionScope};
use crate::export::{self, CsvTable};
use crate::ranking::{rank_size, top_n};
use chrono::NaiveDate;
use insight_core::{AppConfig, FilterCriteria, InsightResult, MetricValue};
use insight_query::rows::{DayOfWeekSalesRow, MonthlySalesRow, RegionSalesRow};
use insight_query::templates::{self, DayOfWeekSales, MonthlySales, QueryOutcome, RegionSales};
use insight_query::TabularStore;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesKpis {
    pub total_sales: f64,
    pub nb_transactions: u64,
    pub avg_ticket: MetricValue,
    /// Month with the highest sales across the selected regions.
    pub best_month: Option<NaiveDate>,
}

impl SalesKpis {
    pub fn from_monthly(rows: &[MonthlySalesRow]) -> Self {
        let total_sales: f64 = rows.iter().map(|r| r.total_sales).sum();
        let nb_transactions: u64 = rows.iter().map(|r| r.nb_transactions).sum();

        let mut by_month: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for row in rows {
            *by_month.entry(row.month).or_default() += row.total_sales;
        }
        // Earliest month wins a tie.
        let best_month = by_month
            .into_iter()
            .fold(None, |best: Option<(NaiveDate, f64)>, (month, sales)| match best {
                Some((_, top)) if top >= sales => best,
                _ => Some((month, sales)),
            })
            .map(|(month, _)| month);

        Self {
            total_sales,
            nb_transactions,
            avg_ticket: MetricValue::ratio(total_sales, nb_transactions as f64),
            best_month,
        }
    }
}

/// Regions leading on each sales measure.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SalesPodiums {
    pub by_sales: Vec<RegionSalesRow>,
    pub by_transactions: Vec<RegionSalesRow>,
    pub by_avg_ticket: Vec<RegionSalesRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesReport {
    pub kpis: Option<SalesKpis>,
    pub region_scope: RegionScope,
    pub monthly: QueryOutcome<MonthlySalesRow>,
    pub scoped_monthly: Vec<MonthlySalesRow>,
    pub day_of_week: QueryOutcome<DayOfWeekSalesRow>,
    pub scoped_day_of_week: Vec<DayOfWeekSalesRow>,
    pub regions: QueryOutcome<RegionSalesRow>,
    pub region_podiums: SalesPodiums,
}

impl SalesReport {
    pub fn csv_tables(&self) -> InsightResult<Vec<CsvTable>> {
        Ok(vec![
            export::table("monthly_sales", &self.monthly)?,
            export::table("region_sales", &self.regions)?,
            export::table("day_of_week_sales", &self.day_of_week)?,
        ])
    }
}

pub fn sales_report<S: TabularStore + ?Sized>(
    store: &S,
    criteria: &FilterCriteria,
    scope: &RegionScope,
    config: &AppConfig,
) -> InsightResult<SalesReport> {
    let monthly = templates::run(&MonthlySales, store, criteria)?;
    let regions = templates::run(&RegionSales, store, criteria)?;
    let day_of_week = templates::run(&DayOfWeekSales, store, criteria)?;

    let kpis = monthly.rows().map(SalesKpis::from_monthly);
    let scoped_monthly = reaggregate(monthly.rows_or_empty(), scope);
    let scoped_day_of_week = reaggregate(day_of_week.rows_or_empty(), scope);

    let podium = rank_size(config.query.podium_size);
    let region_rows = regions.rows_or_empty();
    let region_podiums = SalesPodiums {
        by_sales: top_n(region_rows, podium, |r| MetricValue::Value(r.total_sales)),
        by_transactions: top_n(region_rows, podium, |r| {
            MetricValue::Value(r.nb_transactions as f64)
        }),
        by_avg_ticket: top_n(region_rows, podium, |r| r.avg_transaction_value),
    };

    metrics::counter!("reporting.views", "view" => "sales").increment(1);
    info!(
        scope = %scope,
        months = scoped_monthly.len(),
        regions = region_rows.len(),
        "Sales view computed"
    );

    Ok(SalesReport {
        kpis,
        region_scope: scope.clone(),
        monthly,
        scoped_monthly,
        day_of_week,
        scoped_day_of_week,
        regions,
        region_podiums,
    })
}
