//! Turns a free-text request plus schema context into a candidate SQL query.

use crate::error::{ChatError, Result};
use crate::llm::LlmClient;
use regex::Regex;
use std::collections::BTreeMap;

/// SQL text produced by the model. Not trusted until the gate accepts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateQuery {
    pub text: String,
}

/// Schema description embedded in the synthesis prompt.
#[derive(Debug, Clone, Default)]
pub struct SchemaContext {
    /// Table name -> `column (type)` lines.
    pub tables: BTreeMap<String, Vec<String>>,
}

impl SchemaContext {
    fn render(&self) -> String {
        let mut out = Vec::with_capacity(self.tables.len());
        for (table, columns) in &self.tables {
            out.push(format!("Table {}:\n  {}", table, columns.join("\n  ")));
        }
        out.join("\n")
    }
}

// Join hints the model needs but cannot reflect from DESCRIBE output.
const TABLE_RELATIONSHIPS: &str = r#"Important Table Relationships:
- production_product joins with production_productcategory using ProductCategoryID
- production_product joins with production_productsubcategory using ProductSubcategoryID
- production_productsubcategory joins with production_productcategory using ProductCategoryID

Common Join Patterns:
- For product categories:
  SELECT p.Name AS ProductName, pc.Name AS CategoryName
  FROM production_product p
  LEFT JOIN production_productsubcategory ps ON p.ProductSubcategoryID = ps.ProductSubcategoryID
  LEFT JOIN production_productcategory pc ON ps.ProductCategoryID = pc.ProductCategoryID"#;

pub struct QuerySynthesizer {
    llm: LlmClient,
}

impl QuerySynthesizer {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    /// One model call, one candidate. No retries: a bad candidate surfaces to
    /// the caller through the validation gate instead.
    pub async fn synthesize(
        &self,
        user_input: &str,
        schema: &SchemaContext,
    ) -> Result<CandidateQuery> {
        let prompt = build_prompt(user_input, schema);
        let raw = self.llm.complete(&prompt).await?;
        let cleaned = clean_raw_sql(&raw);
        if cleaned == ";" {
            return Err(ChatError::Llm("Model returned an empty query".to_string()));
        }
        Ok(CandidateQuery { text: cleaned })
    }
}

fn build_prompt(user_input: &str, schema: &SchemaContext) -> String {
    format!(
        r#"Convert this user request into a MySQL query:
"{}"

Database Schema:
{}

{}

Rules:
- Use only standard MySQL syntax
- For date comparisons, use CURDATE() for the current date
- Always use table aliases (e.g., p for production_product)
- Include LIMIT 100 unless a specific limit is requested
- Use LEFT JOINs to handle products without categories
- Always qualify column names with table aliases
- Return only the SQL query without any explanation"#,
        user_input,
        schema.render(),
        TABLE_RELATIONSHIPS
    )
}

/// Normalize raw model output into a single-line SQL statement.
///
/// Strips markdown code fences, collapses whitespace runs, and guarantees a
/// trailing semicolon.
pub fn clean_raw_sql(raw: &str) -> String {
    let fence = Regex::new(r"```sql\s*|\s*```").expect("static regex");
    let without_fences = fence.replace_all(raw, "");
    let mut query = without_fences
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    if !query.ends_with(';') {
        query.push(';');
    }
    query
}
