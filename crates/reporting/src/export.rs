//! Delimited export of result tables.

use insight_core::{InsightError, InsightResult};
use insight_query::{QueryOutcome, TabularRow};
use serde::Serialize;
use std::io::Write;

/// One exported table: its name and the CSV text, header row included.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CsvTable {
    pub name: String,
    pub content: String,
}

/// Write `rows` as CSV with a header row. Undefined metrics are empty cells.
pub fn write_csv<T: TabularRow, W: Write>(rows: &[T], writer: W) -> InsightResult<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(T::COLUMNS)?;
    for row in rows {
        csv.write_record(row.cells())?;
    }
    csv.flush()?;
    Ok(())
}

pub fn to_csv<T: TabularRow>(rows: &[T]) -> InsightResult<String> {
    let mut buf = Vec::new();
    write_csv(rows, &mut buf)?;
    String::from_utf8(buf).map_err(|e| InsightError::Internal(e.into()))
}

/// Export a template outcome. "No data" exports the header alone.
pub fn table<T: TabularRow>(name: &str, outcome: &QueryOutcome<T>) -> InsightResult<CsvTable> {
    Ok(CsvTable {
        name: name.to_string(),
        content: to_csv(outcome.rows_or_empty())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_core::{Dimension, MetricValue};
    use insight_query::rows::RegionSalesRow;
    use insight_query::NoData;

    fn rows() -> Vec<RegionSalesRow> {
        vec![
            RegionSalesRow {
                region: "Côte d'Azur, Sud".into(),
                nb_transactions: 2,
                total_sales: 150.5,
                avg_transaction_value: MetricValue::Value(75.25),
            },
            RegionSalesRow {
                region: "Nord".into(),
                nb_transactions: 0,
                total_sales: 0.0,
                avg_transaction_value: MetricValue::Undefined,
            },
        ]
    }

    #[test]
    fn test_header_matches_row_fields() {
        let csv = to_csv(&rows()).unwrap();
        let header = csv.lines().next().unwrap();
        assert_eq!(header, "region,nb_transactions,total_sales,avg_transaction_value");
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_values_are_quoted_and_undefined_is_empty() {
        let csv = to_csv(&rows()).unwrap();
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[1], "\"Côte d'Azur, Sud\",2,150.5,75.25");
        assert_eq!(lines[2], "Nord,0,0,");
    }

    #[test]
    fn test_no_data_exports_header_only() {
        let outcome: QueryOutcome<RegionSalesRow> = QueryOutcome::NoData(NoData {
            missing: vec![Dimension::Region],
        });
        let table = table("region_sales", &outcome).unwrap();
        assert_eq!(table.name, "region_sales");
        assert_eq!(table.content.lines().count(), 1);
    }
}
