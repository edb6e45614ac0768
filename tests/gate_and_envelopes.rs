//! End-to-end checks of the validation gate and the response envelopes,
//! exercised through the public API. No database or model service needed:
//! everything here is the deterministic part of the pipeline.

use querychat::error::ChatError;
use querychat::executor::ResultSet;
use querychat::pipeline::{error_response, success_response, ChatReply};
use querychat::summarizer::format_result_summary;
use querychat::synthesizer::{clean_raw_sql, CandidateQuery};
use querychat::validator::validate;
use serde_json::json;

fn adventureworks_tables() -> Vec<String> {
    [
        "production_product",
        "production_productcategory",
        "production_productsubcategory",
        "sales_customer",
        "sales_salesorderheader",
        "sales_salesorderdetail",
        "humanresources_employee",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn candidate(text: &str) -> CandidateQuery {
    CandidateQuery {
        text: text.to_string(),
    }
}

#[test]
fn model_output_survives_cleanup_and_the_gate() {
    // What a well-behaved model reply looks like, fences and all.
    let raw = "```sql\nSELECT p.Name, p.ListPrice\nFROM production_product p\nWHERE p.ListPrice < 50\nLIMIT 100\n```";
    let cleaned = clean_raw_sql(raw);
    assert!(cleaned.ends_with(';'));

    let verdict = validate(&candidate(&cleaned), &adventureworks_tables());
    assert!(verdict.accepted, "verdict was {:?}", verdict.reason);
}

#[test]
fn hallucinated_table_is_rejected_with_a_real_suggestion() {
    let verdict = validate(
        &candidate("SELECT * FROM productz LIMIT 100;"),
        &adventureworks_tables(),
    );
    assert!(!verdict.accepted);
    let reason = verdict.reason.expect("rejection carries a reason");
    assert!(reason.contains("productz"));
    assert!(
        reason.contains("product"),
        "suggestion should mention a real table containing 'product': {}",
        reason
    );
}

#[test]
fn destructive_statements_never_pass_even_when_disguised_as_selects() {
    for text in [
        "SELECT * FROM production_product; DROP TABLE production_product;",
        "SELECT Name FROM production_product WHERE Name = 'x'; DELETE FROM sales_customer;",
        "UPDATE production_product SET ListPrice = 0;",
    ] {
        let verdict = validate(&candidate(text), &adventureworks_tables());
        assert!(!verdict.accepted, "should have rejected: {}", text);
    }
}

#[test]
fn gate_ordering_is_stable_across_repeated_validation() {
    let query = candidate("SELECT * FROM productz; -- note");
    let tables = adventureworks_tables();
    let first = validate(&query, &tables);
    let second = validate(&query, &tables);
    assert_eq!(first, second);
}

#[test]
fn rejection_turns_into_a_400_envelope_with_the_query_attached() {
    let tables = adventureworks_tables();
    let query = candidate("SELECT * FROM productz;");
    let verdict = validate(&query, &tables);
    assert!(!verdict.accepted);

    let err = ChatError::Validation {
        reason: verdict.reason.unwrap(),
        query: query.text.clone(),
        suggestions: verdict.suggestions,
    };
    let (status, body) = error_response(&err, "show me products under $50");

    assert_eq!(status, 400);
    assert_eq!(body["status"], "error");
    assert_eq!(body["user_input"], "show me products under $50");
    assert_eq!(body["sql_query"], "SELECT * FROM productz;");
    assert!(body["error"].as_str().unwrap().contains("production_product"));
}

#[test]
fn missing_input_envelope_is_the_bare_error_object() {
    let (status, body) = error_response(&ChatError::BadRequest, "");
    assert_eq!(status, 400);
    assert_eq!(body, json!({ "error": "No input provided" }));
}

#[test]
fn config_and_database_failures_map_to_different_envelopes() {
    let config = error_response(&ChatError::ApiConfig("key unset".into()), "q");
    let database = error_response(&ChatError::Database("connection refused".into()), "q");
    assert_eq!(config.0, 500);
    assert_eq!(database.0, 400);
    assert_ne!(config.1["error"], database.1["error"]);
}

#[test]
fn success_envelope_round_trips_the_result_set() {
    let rs = ResultSet {
        columns: vec!["Name".to_string(), "ListPrice".to_string()],
        rows: vec![
            vec![json!("Helmet"), json!("34.99")],
            vec![json!("Gloves"), json!("24.49")],
        ],
    };
    let reply = ChatReply {
        user_input: "show me products under $50".to_string(),
        sql_query: "SELECT p.Name, p.ListPrice FROM production_product p LIMIT 100;".to_string(),
        summary: format_result_summary(&rs),
        results: rs.records(),
    };

    let body = success_response(&reply);
    assert_eq!(body["status"], "success");
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(body["results"][0]["Name"], "Helmet");
    assert!(body["summary"].as_str().unwrap().starts_with("Found 2 results:"));
    assert!(body["summary"].as_str().unwrap().contains("$34.99"));
}

#[test]
fn empty_result_set_summary_is_first_class() {
    let rs = ResultSet {
        columns: vec!["Name".to_string()],
        rows: vec![],
    };
    assert_eq!(format_result_summary(&rs), "No results found.");
}
