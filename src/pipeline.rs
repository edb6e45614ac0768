//! The request pipeline: synthesize, gate, execute, summarize.
//!
//! Each stage is blocking with respect to the next and any failure
//! short-circuits. Classification of failures into user-facing envelopes
//! also lives here so the server binary stays a thin transport adapter.

use crate::catalog::SchemaCatalog;
use crate::error::{ChatError, Result};
use crate::executor::{ExecutionOutcome, QueryExecutor, ResultSet};
use crate::summarizer::Summarize;
use crate::synthesizer::{QuerySynthesizer, SchemaContext};
use crate::validator;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub user_input: String,
    pub sql_query: String,
    pub summary: String,
    pub results: Vec<serde_json::Map<String, Value>>,
}

pub struct ChatPipeline {
    catalog: Arc<SchemaCatalog>,
    synthesizer: QuerySynthesizer,
    executor: QueryExecutor,
    summarizer: Box<dyn Summarize>,
}

impl ChatPipeline {
    pub fn new(
        catalog: Arc<SchemaCatalog>,
        synthesizer: QuerySynthesizer,
        executor: QueryExecutor,
        summarizer: Box<dyn Summarize>,
    ) -> Self {
        Self {
            catalog,
            synthesizer,
            executor,
            summarizer,
        }
    }

    /// Run one request end to end. Nothing downstream is touched when the
    /// input is empty.
    pub async fn handle(&self, user_input: &str) -> Result<ChatReply> {
        if user_input.trim().is_empty() {
            return Err(ChatError::BadRequest);
        }

        let request_id = Uuid::new_v4();
        info!(%request_id, "Handling chat request: {:?}", user_input);

        let schema = SchemaContext {
            tables: self.catalog.table_info().await?,
        };
        let candidate = self.synthesizer.synthesize(user_input, &schema).await?;
        info!(%request_id, "Generated SQL: {}", candidate.text);

        let valid_tables = self.catalog.table_names().await?;
        let verdict = validator::validate(&candidate, &valid_tables);
        if !verdict.accepted {
            let reason = verdict
                .reason
                .unwrap_or_else(|| "Query rejected".to_string());
            info!(%request_id, "Validation rejected query: {}", reason);
            return Err(ChatError::Validation {
                reason,
                query: candidate.text,
                suggestions: verdict.suggestions,
            });
        }

        let result = match self.executor.execute(&candidate).await? {
            ExecutionOutcome::Rows(rows) => rows,
            ExecutionOutcome::Affected(count) => {
                // The gate only passes SELECTs, so this arm means the policy
                // was relaxed somewhere. Report it as an empty result set.
                error!(%request_id, "Non-SELECT statement passed the gate, {} rows affected", count);
                ResultSet {
                    columns: vec!["affected_rows".to_string()],
                    rows: vec![vec![json!(count)]],
                }
            }
        };
        info!(%request_id, "Query returned {} rows", result.rows.len());

        let summary = self.summarizer.summarize(&result).await?;

        Ok(ChatReply {
            user_input: user_input.to_string(),
            sql_query: candidate.text,
            summary,
            results: result.records(),
        })
    }
}

/// Map a pipeline failure to its HTTP status and response body.
///
/// Validation and database messages go to the caller verbatim since they are
/// what makes a bad generation debuggable. Everything else gets a generic
/// message with the detail in a separate field.
pub fn error_response(err: &ChatError, user_input: &str) -> (u16, Value) {
    match err {
        ChatError::BadRequest => (400, json!({ "error": "No input provided" })),
        ChatError::Validation { reason, query, .. } => (
            400,
            json!({
                "status": "error",
                "error": reason,
                "sql_query": query,
                "user_input": user_input,
            }),
        ),
        ChatError::Database(message) => (
            400,
            json!({
                "status": "error",
                "error": message,
                "user_input": user_input,
            }),
        ),
        ChatError::ApiConfig(message) => (
            500,
            json!({
                "status": "error",
                "error": "API configuration error. Please contact the administrator.",
                "details": message,
                "user_input": user_input,
            }),
        ),
        other => (
            500,
            json!({
                "status": "error",
                "error": "An unexpected error occurred.",
                "details": other.to_string(),
                "user_input": user_input,
            }),
        ),
    }
}

/// The 200 envelope for a completed request.
pub fn success_response(reply: &ChatReply) -> Value {
    json!({
        "status": "success",
        "summary": reply.summary,
        "user_input": reply.user_input,
        "sql_query": reply.sql_query,
        "results": reply.results,
    })
}
