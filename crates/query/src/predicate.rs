//! Predicate builder: turns filter selections into one composable filter
//! expression that is both rendered as parameterized SQL and evaluated
//! directly against in-memory records.

use insight_core::{Campaign, Dimension, DiscountRange, Promotion, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Columns a predicate may reference. Identifiers only ever come from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Region,
    ProductCategory,
    PromotionType,
    PaymentMethod,
    TransactionType,
    TargetAudience,
    DiscountPercentage,
    Amount,
    Budget,
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Region => "region",
            Self::ProductCategory => "product_category",
            Self::PromotionType => "promotion_type",
            Self::PaymentMethod => "payment_method",
            Self::TransactionType => "transaction_type",
            Self::TargetAudience => "target_audience",
            Self::DiscountPercentage => "discount_percentage",
            Self::Amount => "amount",
            Self::Budget => "budget",
        }
    }
}

/// A value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    Text(String),
    Number(f64),
}

impl Param {
    /// SQL literal for contexts that cannot bind parameters.
    pub fn to_sql_literal(&self) -> String {
        match self {
            Self::Text(s) => quote_literal(s),
            Self::Number(n) => n.to_string(),
        }
    }
}

/// Quote a string as a SQL literal. Apostrophes are doubled and backslashes
/// escaped so the value can never close the literal early.
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for ch in value.chars() {
        match ch {
            '\'' => quoted.push_str("''"),
            '\\' => quoted.push_str("\\\\"),
            _ => quoted.push(ch),
        }
    }
    quoted.push('\'');
    quoted
}

/// One conjunct of a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Clause {
    InSet { column: Column, values: Vec<String> },
    Equals { column: Column, value: String },
    /// Inclusive on both bounds.
    Between { column: Column, min: f64, max: f64 },
    AtLeast { column: Column, min: f64 },
    GreaterThan { column: Column, min: f64 },
    NotNull { column: Column },
}

impl Clause {
    pub fn column(&self) -> Column {
        match self {
            Self::InSet { column, .. }
            | Self::Equals { column, .. }
            | Self::Between { column, .. }
            | Self::AtLeast { column, .. }
            | Self::GreaterThan { column, .. }
            | Self::NotNull { column } => *column,
        }
    }

    fn matches<R: FieldSource + ?Sized>(&self, record: &R) -> bool {
        match self {
            Self::InSet { column, values } => record
                .text(*column)
                .is_some_and(|v| values.iter().any(|candidate| candidate == v)),
            Self::Equals { column, value } => record.text(*column) == Some(value.as_str()),
            Self::Between { column, min, max } => record
                .number(*column)
                .is_some_and(|v| *min <= v && v <= *max),
            Self::AtLeast { column, min } => record.number(*column).is_some_and(|v| v >= *min),
            Self::GreaterThan { column, min } => {
                record.number(*column).is_some_and(|v| v > *min)
            }
            Self::NotNull { column } => {
                record.text(*column).is_some() || record.number(*column).is_some()
            }
        }
    }

    fn render(&self, alias: Option<&str>, sql: &mut SqlWriter) {
        let column = match alias {
            Some(a) => format!("{a}.{}", self.column().name()),
            None => self.column().name().to_string(),
        };
        match self {
            Self::InSet { values, .. } => {
                sql.push_str(&column);
                sql.push_str(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    sql.bind(Param::Text(value.clone()));
                }
                sql.push_str(")");
            }
            Self::Equals { value, .. } => {
                sql.push_str(&column);
                sql.push_str(" = ");
                sql.bind(Param::Text(value.clone()));
            }
            Self::Between { min, max, .. } => {
                sql.push_str(&column);
                sql.push_str(" BETWEEN ");
                sql.bind(Param::Number(*min));
                sql.push_str(" AND ");
                sql.bind(Param::Number(*max));
            }
            Self::AtLeast { min, .. } => {
                sql.push_str(&column);
                sql.push_str(" >= ");
                sql.bind(Param::Number(*min));
            }
            Self::GreaterThan { min, .. } => {
                sql.push_str(&column);
                sql.push_str(" > ");
                sql.bind(Param::Number(*min));
            }
            Self::NotNull { .. } => {
                sql.push_str(&column);
                sql.push_str(" IS NOT NULL");
            }
        }
    }
}

/// Field access used to evaluate a [`Predicate`] against a record.
pub trait FieldSource {
    fn text(&self, column: Column) -> Option<&str>;
    fn number(&self, column: Column) -> Option<f64>;
}

impl FieldSource for Transaction {
    fn text(&self, column: Column) -> Option<&str> {
        match column {
            Column::Region => Some(self.region.as_str()),
            Column::PaymentMethod => Some(self.payment_method.as_str()),
            Column::TransactionType => Some(self.transaction_type.as_str()),
            _ => None,
        }
    }

    fn number(&self, column: Column) -> Option<f64> {
        match column {
            Column::Amount => Some(self.amount),
            _ => None,
        }
    }
}

impl FieldSource for Campaign {
    fn text(&self, column: Column) -> Option<&str> {
        match column {
            Column::Region => Some(self.region.as_str()),
            Column::TargetAudience => self.target_audience.as_deref(),
            _ => None,
        }
    }

    fn number(&self, column: Column) -> Option<f64> {
        match column {
            Column::Budget => Some(self.budget),
            _ => None,
        }
    }
}

impl FieldSource for Promotion {
    fn text(&self, column: Column) -> Option<&str> {
        match column {
            Column::Region => Some(self.region.as_str()),
            Column::ProductCategory => Some(self.product_category.as_str()),
            Column::PromotionType => Some(self.promotion_type.as_str()),
            _ => None,
        }
    }

    fn number(&self, column: Column) -> Option<f64> {
        match column {
            Column::DiscountPercentage => Some(self.discount_percentage),
            _ => None,
        }
    }
}

/// A conjunction of clauses. The empty predicate matches every record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    pub fn always() -> Self {
        Self::default()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn matches<R: FieldSource + ?Sized>(&self, record: &R) -> bool {
        self.clauses.iter().all(|c| c.matches(record))
    }

    /// Keep only the clauses on `columns`.
    pub fn restricted_to(&self, columns: &[Column]) -> Self {
        Self {
            clauses: self
                .clauses
                .iter()
                .filter(|c| columns.contains(&c.column()))
                .cloned()
                .collect(),
        }
    }

    /// Append this predicate to `sql`, qualifying columns with `alias`.
    pub fn render_into(&self, alias: Option<&str>, sql: &mut SqlWriter) {
        if self.clauses.is_empty() {
            sql.push_str("TRUE");
            return;
        }
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            clause.render(alias, sql);
        }
    }

    pub fn render(&self, alias: Option<&str>) -> BoundSql {
        let mut sql = SqlWriter::new();
        self.render_into(alias, &mut sql);
        sql.finish()
    }
}

/// The "no data for these criteria" sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoData {
    /// Required dimensions whose selection was empty.
    pub missing: Vec<Dimension>,
}

impl std::fmt::Display for NoData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.missing.iter().map(|d| d.as_str()).collect();
        write!(f, "no data: empty selection for {}", names.join(", "))
    }
}

/// Builds a [`Predicate`] from filter selections.
///
/// Required selections that are empty are collected instead of producing a
/// clause; [`PredicateBuilder::build`] then returns [`NoData`].
#[derive(Debug, Default)]
pub struct PredicateBuilder {
    clauses: Vec<Clause>,
    missing: Vec<Dimension>,
}

impl PredicateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column IN (values)`; an empty selection marks `dimension` missing.
    pub fn require_any_of(
        mut self,
        dimension: Dimension,
        column: Column,
        values: &BTreeSet<String>,
    ) -> Self {
        if values.is_empty() {
            if !self.missing.contains(&dimension) {
                self.missing.push(dimension);
            }
        } else {
            self.clauses.push(Clause::InSet {
                column,
                values: values.iter().cloned().collect(),
            });
        }
        self
    }

    pub fn equals(mut self, column: Column, value: impl Into<String>) -> Self {
        self.clauses.push(Clause::Equals {
            column,
            value: value.into(),
        });
        self
    }

    pub fn between(mut self, column: Column, range: DiscountRange) -> Self {
        self.clauses.push(Clause::Between {
            column,
            min: range.min,
            max: range.max,
        });
        self
    }

    pub fn at_least(mut self, column: Column, min: f64) -> Self {
        self.clauses.push(Clause::AtLeast { column, min });
        self
    }

    pub fn greater_than(mut self, column: Column, min: f64) -> Self {
        self.clauses.push(Clause::GreaterThan { column, min });
        self
    }

    pub fn not_null(mut self, column: Column) -> Self {
        self.clauses.push(Clause::NotNull { column });
        self
    }

    pub fn build(self) -> Result<Predicate, NoData> {
        if self.missing.is_empty() {
            Ok(Predicate {
                clauses: self.clauses,
            })
        } else {
            Err(NoData {
                missing: self.missing,
            })
        }
    }
}

/// SQL text with `?` placeholders and the parameters bound to them, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundSql {
    pub sql: String,
    pub params: Vec<Param>,
}

impl BoundSql {
    /// Substitute every placeholder with a quoted literal, for explain output.
    /// Substituted text is never rescanned.
    pub fn to_inline_sql(&self) -> String {
        let mut out = String::with_capacity(self.sql.len());
        let mut params = self.params.iter();
        for ch in self.sql.chars() {
            if ch == '?' {
                match params.next() {
                    Some(p) => out.push_str(&p.to_sql_literal()),
                    None => out.push(ch),
                }
            } else {
                out.push(ch);
            }
        }
        out
    }
}

/// Accumulates SQL text and bound parameters side by side so placeholder
/// order always matches parameter order.
#[derive(Debug, Default)]
pub struct SqlWriter {
    sql: String,
    params: Vec<Param>,
}

impl SqlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_str(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    pub fn bind(&mut self, param: Param) {
        self.sql.push('?');
        self.params.push(param);
    }

    pub fn finish(self) -> BoundSql {
        BoundSql {
            sql: self.sql,
            params: self.params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn sale(region: &str, method: &str, amount: f64) -> Transaction {
        Transaction {
            id: "t1".into(),
            region: region.into(),
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            amount,
            transaction_type: "Sale".into(),
            payment_method: method.into(),
        }
    }

    fn promo(discount: f64) -> Promotion {
        Promotion {
            id: "p1".into(),
            region: "Nord".into(),
            product_category: "Epices".into(),
            promotion_type: "Flash".into(),
            discount_percentage: discount,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(),
        }
    }

    #[test]
    fn test_empty_required_selection_yields_no_data() {
        let outcome = PredicateBuilder::new()
            .require_any_of(Dimension::Region, Column::Region, &set(&["Nord"]))
            .require_any_of(Dimension::PaymentMethod, Column::PaymentMethod, &set(&[]))
            .build();
        assert_eq!(
            outcome,
            Err(NoData {
                missing: vec![Dimension::PaymentMethod]
            })
        );
    }

    #[test]
    fn test_values_are_bound_not_inlined() {
        let predicate = PredicateBuilder::new()
            .require_any_of(
                Dimension::Region,
                Column::Region,
                &set(&["Côte d'Azur", "x') OR 1=1 --"]),
            )
            .build()
            .unwrap();
        let bound = predicate.render(Some("ft"));
        assert_eq!(bound.sql, "ft.region IN (?, ?)");
        assert!(!bound.sql.contains("OR 1=1"));
        assert_eq!(bound.params.len(), 2);
        assert!(bound
            .params
            .contains(&Param::Text("x') OR 1=1 --".to_string())));
    }

    #[test]
    fn test_inline_rendering_doubles_apostrophes() {
        let predicate = PredicateBuilder::new()
            .require_any_of(Dimension::Region, Column::Region, &set(&["Côte d'Azur"]))
            .build()
            .unwrap();
        let inline = predicate.render(None).to_inline_sql();
        assert_eq!(inline, "region IN ('Côte d''Azur')");
    }

    #[test]
    fn test_inline_rendering_does_not_rescan_substituted_text() {
        let bound = BoundSql {
            sql: "a = ? AND b = ?".into(),
            params: vec![Param::Text("what?".into()), Param::Number(2.0)],
        };
        assert_eq!(bound.to_inline_sql(), "a = 'what?' AND b = 2");
    }

    #[test]
    fn test_quote_literal_escapes_backslash() {
        assert_eq!(quote_literal(r"a\'b"), r"'a\\''b'");
    }

    #[test]
    fn test_apostrophe_value_matches_exactly() {
        let predicate = PredicateBuilder::new()
            .require_any_of(Dimension::Region, Column::Region, &set(&["Côte d'Azur"]))
            .build()
            .unwrap();
        assert!(predicate.matches(&sale("Côte d'Azur", "Card", 10.0)));
        assert!(!predicate.matches(&sale("Côte d", "Card", 10.0)));
    }

    #[test]
    fn test_ranges_are_inclusive_and_unclamped() {
        let predicate = PredicateBuilder::new()
            .at_least(Column::Amount, 50.0)
            .build()
            .unwrap();
        assert!(predicate.matches(&sale("Nord", "Card", 50.0)));
        assert!(!predicate.matches(&sale("Nord", "Card", 49.99)));

        let negative = PredicateBuilder::new()
            .at_least(Column::Amount, -100.0)
            .build()
            .unwrap();
        assert!(negative.matches(&sale("Nord", "Card", 0.0)));
        assert_eq!(negative.render(None).params, vec![Param::Number(-100.0)]);
    }

    #[test]
    fn test_discount_range_includes_both_bounds() {
        let predicate = PredicateBuilder::new()
            .between(Column::DiscountPercentage, DiscountRange::new(0.2, 0.4))
            .build()
            .unwrap();
        assert!(predicate.matches(&promo(0.2)));
        assert!(predicate.matches(&promo(0.4)));
        assert!(!predicate.matches(&promo(0.19)));
        assert!(!predicate.matches(&promo(0.41)));

        let bound = predicate.render(Some("p"));
        assert_eq!(bound.sql, "p.discount_percentage BETWEEN ? AND ?");
        assert_eq!(bound.params, vec![Param::Number(0.2), Param::Number(0.4)]);
    }

    #[test]
    fn test_out_of_domain_discount_bounds_pass_through() {
        let predicate = PredicateBuilder::new()
            .between(Column::DiscountPercentage, DiscountRange::new(-0.5, 2.0))
            .build()
            .unwrap();
        assert!(predicate.matches(&promo(0.0)));
        assert!(predicate.matches(&promo(1.0)));
        assert_eq!(
            predicate.render(None).params,
            vec![Param::Number(-0.5), Param::Number(2.0)]
        );
    }

    #[test]
    fn test_empty_predicate_matches_all_and_renders_true() {
        let predicate = Predicate::always();
        assert!(predicate.matches(&sale("Nord", "Card", 1.0)));
        assert_eq!(predicate.render(None).sql, "TRUE");
    }

    #[test]
    fn test_restricted_to_keeps_only_named_columns() {
        let predicate = PredicateBuilder::new()
            .require_any_of(Dimension::Region, Column::Region, &set(&["Nord"]))
            .require_any_of(Dimension::PaymentMethod, Column::PaymentMethod, &set(&["Card"]))
            .at_least(Column::Amount, 10.0)
            .build()
            .unwrap();
        let keys = predicate.restricted_to(&[Column::Region]);
        assert_eq!(keys.clauses().len(), 1);
        assert!(keys.matches(&sale("Nord", "Cash", 1.0)));
    }
}
