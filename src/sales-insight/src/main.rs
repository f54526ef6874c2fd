//! Sales Insight: filtered marketing, promotion and sales analytics.
//!
//! Loads a dataset, builds the filter criteria from the command line and
//! prints the requested views as JSON or CSV.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use insight_cache::CachedStore;
use insight_core::config::LoggingConfig;
use insight_core::{AppConfig, Dataset, DiscountRange, FilterCriteria};
use insight_query::templates::{
    AudiencePerformance, CampaignRoi, CampaignTypePerformance, CategorySensitivity,
    DayOfWeekSales, DiscountDistribution, MetricTemplate, MonthlySales, PromotionImpact,
    RegionPromotions, RegionSales,
};
use insight_query::{select_all_options, InMemoryWarehouse, TabularStore};
use insight_reporting::{
    marketing_report, promotion_report, sales_report, CsvTable, MarketingReport,
    PromotionReport, RegionScope, SalesReport,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum View {
    Marketing,
    Promotions,
    Sales,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "sales-insight")]
#[command(about = "Filtered marketing ROI, promotion and sales analytics")]
#[command(version)]
struct Cli {
    /// JSON dataset with transactions, campaigns and promotions (overrides config)
    #[arg(long, env = "SALES_INSIGHT__DATASET_PATH")]
    dataset: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = View::All)]
    view: View,

    /// Region to include; repeat for several. Omitted selects every region.
    #[arg(long = "region")]
    regions: Vec<String>,

    #[arg(long = "category")]
    categories: Vec<String>,

    #[arg(long = "promo-type")]
    promotion_types: Vec<String>,

    #[arg(long = "payment-method")]
    payment_methods: Vec<String>,

    /// Lowest promotion discount, in percent
    #[arg(long, default_value_t = 0.0)]
    min_discount: f64,

    /// Highest promotion discount, in percent
    #[arg(long, default_value_t = 100.0)]
    max_discount: f64,

    /// Smallest transaction amount counted in sales
    #[arg(long, default_value_t = 0.0)]
    min_amount: f64,

    /// "All" to collapse region-grouped tables, or a region name
    #[arg(long, default_value = "All")]
    region_scope: RegionScope,

    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Print the bound SQL of every template instead of running the views
    #[arg(long, default_value_t = false)]
    explain: bool,

    /// Disable the query cache (overrides config)
    #[arg(long, default_value_t = false)]
    no_cache: bool,
}

#[derive(Debug, Default, Serialize)]
struct Output {
    #[serde(skip_serializing_if = "Option::is_none")]
    marketing: Option<MarketingReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    promotions: Option<PromotionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sales: Option<SalesReport>,
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.filter.as_str().into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Explicit selections win; an omitted selection means every option.
fn selection(chosen: Vec<String>, available: BTreeSet<String>) -> BTreeSet<String> {
    if chosen.is_empty() {
        available
    } else {
        chosen.into_iter().collect()
    }
}

fn build_criteria(cli: &Cli, store: &dyn TabularStore) -> anyhow::Result<FilterCriteria> {
    let all = select_all_options(store)?;
    Ok(FilterCriteria {
        regions: selection(cli.regions.clone(), all.regions),
        categories: selection(cli.categories.clone(), all.categories),
        promotion_types: selection(cli.promotion_types.clone(), all.promotion_types),
        payment_methods: selection(cli.payment_methods.clone(), all.payment_methods),
        discount_range: DiscountRange::from_percent(cli.min_discount, cli.max_discount),
        min_amount: cli.min_amount,
    })
}

fn print_explain<T: MetricTemplate>(template: &T, criteria: &FilterCriteria) {
    println!("-- {}", template.kind());
    match template.build(criteria) {
        Ok(query) => println!("{};\n", query.bound.to_inline_sql()),
        Err(no_data) => println!("-- {no_data}\n"),
    }
}

fn explain(view: View, criteria: &FilterCriteria, config: &AppConfig) {
    if matches!(view, View::Marketing | View::All) {
        // The marketing view caps the campaign table after computing KPIs.
        print_explain(&CampaignRoi { limit: None }, criteria);
        print_explain(&CampaignTypePerformance, criteria);
        print_explain(
            &AudiencePerformance {
                limit: config.query.audience_limit,
            },
            criteria,
        );
    }
    if matches!(view, View::Promotions | View::All) {
        print_explain(&PromotionImpact, criteria);
        print_explain(&CategorySensitivity, criteria);
        print_explain(&DiscountDistribution, criteria);
        print_explain(&RegionPromotions, criteria);
    }
    if matches!(view, View::Sales | View::All) {
        print_explain(&MonthlySales, criteria);
        print_explain(&RegionSales, criteria);
        print_explain(&DayOfWeekSales, criteria);
    }
}

async fn run_views(
    view: View,
    store: Arc<dyn TabularStore>,
    criteria: FilterCriteria,
    scope: RegionScope,
    config: AppConfig,
) -> anyhow::Result<Output> {
    let mut output = Output::default();

    // Views are independent; run them side by side over the same snapshot.
    let marketing = matches!(view, View::Marketing | View::All).then(|| {
        let (store, criteria, config) = (store.clone(), criteria.clone(), config.clone());
        tokio::task::spawn_blocking(move || marketing_report(&*store, &criteria, &config))
    });
    let promotions = matches!(view, View::Promotions | View::All).then(|| {
        let (store, criteria, scope, config) =
            (store.clone(), criteria.clone(), scope.clone(), config.clone());
        tokio::task::spawn_blocking(move || promotion_report(&*store, &criteria, &scope, &config))
    });
    let sales = matches!(view, View::Sales | View::All).then(|| {
        let (store, criteria, scope, config) =
            (store.clone(), criteria.clone(), scope.clone(), config.clone());
        tokio::task::spawn_blocking(move || sales_report(&*store, &criteria, &scope, &config))
    });

    if let Some(task) = marketing {
        output.marketing = Some(task.await??);
    }
    if let Some(task) = promotions {
        output.promotions = Some(task.await??);
    }
    if let Some(task) = sales {
        output.sales = Some(task.await??);
    }
    Ok(output)
}

fn print_csv(output: &Output) -> anyhow::Result<()> {
    let mut tables: Vec<CsvTable> = Vec::new();
    if let Some(report) = &output.marketing {
        tables.extend(report.csv_tables()?);
    }
    if let Some(report) = &output.promotions {
        tables.extend(report.csv_tables()?);
    }
    if let Some(report) = &output.sales {
        tables.extend(report.csv_tables()?);
    }
    for table in tables {
        println!("# {}", table.name);
        println!("{}", table.content);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (mut config, config_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    init_tracing(&config.logging);
    if let Some(e) = config_error {
        warn!(error = %e, "Failed to load config, using defaults");
    }

    // Apply CLI overrides
    if let Some(path) = &cli.dataset {
        config.dataset_path = Some(path.display().to_string());
    }
    if cli.no_cache {
        config.cache.enabled = false;
    }

    let path = config
        .dataset_path
        .clone()
        .context("no dataset given; pass --dataset or set SALES_INSIGHT__DATASET_PATH")?;
    let dataset =
        Dataset::from_json_file(&path).with_context(|| format!("loading dataset {path}"))?;

    info!(
        dataset = %path,
        transactions = dataset.transactions.len(),
        campaigns = dataset.campaigns.len(),
        promotions = dataset.promotions.len(),
        cache = config.cache.enabled,
        "Dataset loaded"
    );

    let warehouse = InMemoryWarehouse::new(dataset);
    let store: Arc<dyn TabularStore> = if config.cache.enabled {
        Arc::new(CachedStore::from_config(warehouse, &config.cache))
    } else {
        Arc::new(warehouse)
    };

    let criteria = build_criteria(&cli, store.as_ref())?;

    if cli.explain {
        explain(cli.view, &criteria, &config);
        return Ok(());
    }

    let output = run_views(
        cli.view,
        store,
        criteria,
        cli.region_scope.clone(),
        config,
    )
    .await?;

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
        OutputFormat::Csv => print_csv(&output)?,
    }

    Ok(())
}
