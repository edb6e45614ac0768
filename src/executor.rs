//! Runs gate-approved SQL and shapes the result for summarization.

use crate::error::{ChatError, Result};
use crate::synthesizer::CandidateQuery;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::{Column, Row, TypeInfo};
use std::time::Duration;
use tracing::warn;

/// Ordered columns plus ordered rows. Every row has exactly one value per
/// column.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Column-keyed records for the response envelope.
    pub fn records(&self) -> Vec<serde_json::Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Statements are SELECT-only once the gate has run, but the non-SELECT arm
/// is kept so a relaxed policy would still report something sensible.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Rows(ResultSet),
    Affected(u64),
}

pub struct QueryExecutor {
    pool: MySqlPool,
    timeout: Duration,
}

impl QueryExecutor {
    pub fn new(pool: MySqlPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Execute one validated statement. The connection comes from the pool
    /// for the duration of the call and goes back on every exit path.
    pub async fn execute(&self, query: &CandidateQuery) -> Result<ExecutionOutcome> {
        if query.text.trim().to_lowercase().starts_with("select") {
            let rows = tokio::time::timeout(
                self.timeout,
                sqlx::query(&query.text).fetch_all(&self.pool),
            )
            .await
            .map_err(|_| ChatError::Database("Query timed out".to_string()))?
            .map_err(|e| ChatError::Database(format!("Query execution failed: {}", e)))?;

            Ok(ExecutionOutcome::Rows(rows_to_result_set(&rows)))
        } else {
            let result = tokio::time::timeout(
                self.timeout,
                sqlx::query(&query.text).execute(&self.pool),
            )
            .await
            .map_err(|_| ChatError::Database("Query timed out".to_string()))?
            .map_err(|e| ChatError::Database(format!("Query execution failed: {}", e)))?;

            Ok(ExecutionOutcome::Affected(result.rows_affected()))
        }
    }
}

fn rows_to_result_set(rows: &[MySqlRow]) -> ResultSet {
    let columns: Vec<String> = match rows.first() {
        Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
        None => Vec::new(),
    };

    let decoded = rows
        .iter()
        .map(|row| {
            (0..row.columns().len())
                .map(|i| decode_value(row, i))
                .collect()
        })
        .collect();

    ResultSet {
        columns,
        rows: decoded,
    }
}

/// Decode one cell into JSON, dispatching on the MySQL column type. Anything
/// unrecognized falls back to its string form, then to null.
fn decode_value(row: &MySqlRow, index: usize) -> Value {
    let type_name = row.columns()[index].type_info().name().to_uppercase();

    match type_name.as_str() {
        "BOOLEAN" => opt(row.try_get::<Option<bool>, _>(index).map(|v| v.map(Value::from))),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            opt(row.try_get::<Option<i64>, _>(index).map(|v| v.map(Value::from)))
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => {
            opt(row.try_get::<Option<u64>, _>(index).map(|v| v.map(Value::from)))
        }
        "FLOAT" | "DOUBLE" => {
            opt(row.try_get::<Option<f64>, _>(index).map(|v| v.map(Value::from)))
        }
        "DECIMAL" => opt(row
            .try_get::<Option<rust_decimal::Decimal>, _>(index)
            .map(|v| v.map(|d| Value::String(d.to_string())))),
        "DATE" => opt(row
            .try_get::<Option<NaiveDate>, _>(index)
            .map(|v| v.map(|d| Value::String(d.to_string())))),
        "DATETIME" => opt(row
            .try_get::<Option<NaiveDateTime>, _>(index)
            .map(|v| v.map(|d| Value::String(d.to_string())))),
        "TIMESTAMP" => opt(row
            .try_get::<Option<DateTime<Utc>>, _>(index)
            .map(|v| v.map(|d| Value::String(d.to_rfc3339())))),
        "TIME" => opt(row
            .try_get::<Option<NaiveTime>, _>(index)
            .map(|v| v.map(|d| Value::String(d.to_string())))),
        _ => match row.try_get::<Option<String>, _>(index) {
            Ok(v) => v.map(Value::String).unwrap_or(Value::Null),
            Err(e) => {
                warn!("Could not decode column {} ({}): {}", index, type_name, e);
                Value::Null
            }
        },
    }
}

fn opt(result: std::result::Result<Option<Value>, sqlx::Error>) -> Value {
    match result {
        Ok(Some(v)) => v,
        Ok(None) => Value::Null,
        Err(e) => {
            warn!("Column decode fell back to null: {}", e);
            Value::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ResultSet {
        ResultSet {
            columns: vec!["Name".to_string(), "ListPrice".to_string()],
            rows: vec![
                vec![json!("Road Bike"), json!(539.99)],
                vec![json!("Helmet"), json!(34.99)],
            ],
        }
    }

    #[test]
    fn rows_match_column_arity() {
        let rs = sample();
        for row in &rs.rows {
            assert_eq!(row.len(), rs.columns.len());
        }
    }

    #[test]
    fn records_are_column_keyed() {
        let records = sample().records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["Name"], json!("Road Bike"));
        assert_eq!(records[1]["ListPrice"], json!(34.99));
    }

    #[test]
    fn empty_result_set_has_no_records() {
        let rs = ResultSet {
            columns: vec!["Name".to_string()],
            rows: vec![],
        };
        assert!(rs.is_empty());
        assert!(rs.records().is_empty());
    }
}
