//! Sales insight reporting: derived metrics, ranking and alerts, CSV
//! export, and the marketing, promotion and sales views.

pub mod derived;
pub mod export;
pub mod marketing;
pub mod promotions;
pub mod ranking;
pub mod sales;

pub use derived::{reaggregate, RegionScope, RegionalRow, ALL_REGIONS};
pub use export::CsvTable;
pub use marketing::{marketing_report, MarketingReport};
pub use promotions::{promotion_report, PromotionReport};
pub use sales::{sales_report, SalesReport};
