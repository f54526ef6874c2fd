//! Shared types for the sales insight engine: fact tables, filter criteria,
//! null-safe metric values, errors, and configuration.

pub mod bucket;
pub mod config;
pub mod error;
pub mod metric;
pub mod types;

pub use bucket::DiscountBucket;
pub use config::AppConfig;
pub use error::{InsightError, InsightResult};
pub use metric::{to_percent, MetricValue};
pub use types::{
    Campaign, Dataset, Dimension, DiscountRange, FilterCriteria, Promotion, Transaction,
    SALE_TRANSACTION_TYPE,
};
