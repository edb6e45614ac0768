//! Turns a result set into a human-readable narrative.
//!
//! Two interchangeable strategies: a model-backed one and a deterministic
//! formatter for deployments that should not spend a second LLM call.

use crate::error::{ChatError, Result};
use crate::executor::ResultSet;
use crate::llm::LlmClient;
use async_trait::async_trait;
use serde_json::Value;

const NO_RESULTS: &str = "No results found.";

const NAME_FIELDS: [&str; 2] = ["Name", "ProductName"];
const PRICE_FIELDS: [&str; 3] = ["ListPrice", "StandardCost", "UnitPrice"];

#[async_trait]
pub trait Summarize: Send + Sync {
    async fn summarize(&self, result: &ResultSet) -> Result<String>;
}

/// Second LLM call over a compact JSON rendering of the rows.
pub struct ModelSummarizer {
    llm: LlmClient,
}

impl ModelSummarizer {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Summarize for ModelSummarizer {
    async fn summarize(&self, result: &ResultSet) -> Result<String> {
        let records = serde_json::to_string_pretty(&result.records())
            .map_err(|e| ChatError::Llm(format!("Failed to serialize results: {}", e)))?;

        let prompt = format!(
            r#"Summarize the following database results in a user-friendly way:
{}
Rules:
1. Provide a concise summary.
2. Include key information and any relevant statistics.
3. Use natural language in your response.
4. If the result is empty, mention that no data was found."#,
            records
        );

        let summary = self.llm.complete(&prompt).await?;
        Ok(summary.trim().to_string())
    }
}

/// No model call: a fixed header plus one bullet line per row.
pub struct PlainSummarizer;

#[async_trait]
impl Summarize for PlainSummarizer {
    async fn summarize(&self, result: &ResultSet) -> Result<String> {
        Ok(format_result_summary(result))
    }
}

pub fn format_result_summary(result: &ResultSet) -> String {
    if result.is_empty() {
        return NO_RESULTS.to_string();
    }

    let count = result.rows.len();
    let mut lines = vec![format!(
        "Found {} result{}:",
        count,
        if count == 1 { "" } else { "s" }
    )];

    for record in result.records() {
        let mut items: Vec<String> = Vec::new();

        if let Some(name) = NAME_FIELDS
            .iter()
            .find_map(|f| record.get(*f).and_then(Value::as_str))
        {
            items.push(name.to_string());
        }

        if let Some(price) = PRICE_FIELDS
            .iter()
            .find_map(|f| record.get(*f).and_then(as_price))
        {
            items.push(format!("${:.2}", price));
        }

        for column in &result.columns {
            if NAME_FIELDS.contains(&column.as_str()) || PRICE_FIELDS.contains(&column.as_str()) {
                continue;
            }
            if let Some(value) = record.get(column) {
                if !value.is_null() {
                    items.push(format!("{}: {}", column, display_value(value)));
                }
            }
        }

        lines.push(format!("\u{2022} {}", items.join(" - ")));
    }

    lines.join("\n")
}

// DECIMAL columns arrive as JSON strings, numeric columns as numbers.
fn as_price(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result_set(columns: &[&str], rows: Vec<Vec<Value>>) -> ResultSet {
        ResultSet {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        }
    }

    #[test]
    fn empty_result_set_gets_fixed_message() {
        let rs = result_set(&["Name"], vec![]);
        assert_eq!(format_result_summary(&rs), "No results found.");
    }

    #[test]
    fn single_row_header_is_singular() {
        let rs = result_set(&["Name"], vec![vec![json!("Helmet")]]);
        let summary = format_result_summary(&rs);
        assert!(summary.starts_with("Found 1 result:"));
        assert!(summary.contains("\u{2022} Helmet"));
    }

    #[test]
    fn price_is_formatted_with_two_decimals() {
        let rs = result_set(
            &["Name", "ListPrice"],
            vec![vec![json!("Road Bike"), json!(539.9)]],
        );
        let summary = format_result_summary(&rs);
        assert!(summary.contains("Road Bike - $539.90"));
    }

    #[test]
    fn decimal_prices_arrive_as_strings() {
        let rs = result_set(
            &["Name", "ListPrice"],
            vec![vec![json!("Road Bike"), json!("539.99")]],
        );
        let summary = format_result_summary(&rs);
        assert!(summary.contains("$539.99"));
    }

    #[test]
    fn first_present_price_field_wins() {
        let rs = result_set(
            &["Name", "StandardCost", "UnitPrice"],
            vec![vec![json!("Helmet"), json!(12.5), json!(34.99)]],
        );
        let summary = format_result_summary(&rs);
        assert!(summary.contains("$12.50"));
        assert!(!summary.contains("$34.99"));
    }

    #[test]
    fn remaining_non_null_columns_are_appended() {
        let rs = result_set(
            &["Name", "ListPrice", "Color", "Size"],
            vec![vec![json!("Road Bike"), json!(539.99), json!("Red"), Value::Null]],
        );
        let summary = format_result_summary(&rs);
        assert!(summary.contains("Color: Red"));
        assert!(!summary.contains("Size"));
    }

    #[test]
    fn rows_without_name_or_price_still_render() {
        let rs = result_set(
            &["OrderQty", "LineTotal"],
            vec![vec![json!(3), json!(104.97)]],
        );
        let summary = format_result_summary(&rs);
        assert!(summary.contains("OrderQty: 3"));
        assert!(summary.contains("LineTotal: 104.97"));
    }

    #[tokio::test]
    async fn plain_summarizer_never_fails_on_empty_input() {
        let rs = result_set(&["Name"], vec![]);
        let summary = PlainSummarizer.summarize(&rs).await.unwrap();
        assert_eq!(summary, "No results found.");
    }
}
