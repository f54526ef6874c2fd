#![warn(clippy::unwrap_used)]

//! Filtered aggregation over the campaign, promotion and transaction tables:
//! safe predicate construction, one template per analytical question, and
//! the store abstraction the templates execute against.

pub mod predicate;
pub mod rows;
pub mod store;
pub mod templates;
pub mod warehouse;

pub use predicate::{BoundSql, Column, NoData, Param, Predicate, PredicateBuilder};
pub use rows::{PromoStatus, TabularRow};
pub use store::{select_all_options, OptionSource, RawRow, TabularStore};
pub use templates::{run, AggregationQuery, MetricTemplate, QueryOutcome, TemplateKind};
pub use warehouse::InMemoryWarehouse;
