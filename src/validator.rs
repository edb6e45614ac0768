//! The validation gate: decides whether model-generated SQL may reach the
//! database. Fails closed.
//!
//! The keyword screen is a deliberate substring scan rather than a tokenizer.
//! It over-rejects (a column named `created_at` trips `create`) and that is
//! the accepted trade-off: rejecting a harmless query costs one round trip,
//! letting a harmful one through costs data.

use crate::synthesizer::CandidateQuery;
use regex::Regex;
use std::collections::BTreeSet;
use strsim::jaro_winkler;

const FORBIDDEN_KEYWORDS: [&str; 9] = [
    "drop", "truncate", "delete", "update", "insert", "alter", "create", "grant", "revoke",
];

// Threshold for the fuzzy fallback when substring containment finds nothing.
const SUGGESTION_SIMILARITY: f64 = 0.85;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationVerdict {
    pub accepted: bool,
    pub reason: Option<String>,
    /// "Did you mean" candidates, populated only for unknown-table rejections.
    pub suggestions: Vec<String>,
}

impl ValidationVerdict {
    fn accept() -> Self {
        Self {
            accepted: true,
            reason: None,
            suggestions: Vec::new(),
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
            suggestions: Vec::new(),
        }
    }
}

/// Check a candidate query against the policy, in a fixed rule order so
/// rejection messages are deterministic. First failing rule wins.
pub fn validate(query: &CandidateQuery, valid_tables: &[String]) -> ValidationVerdict {
    let text = query.text.as_str();

    // Rule 1: empty query
    if text.trim().is_empty() {
        return ValidationVerdict::reject("Empty query is not allowed");
    }

    let lower = text.to_lowercase();

    // Rule 2: forbidden keywords, substring match anywhere
    for keyword in FORBIDDEN_KEYWORDS {
        if lower.contains(keyword) {
            return ValidationVerdict::reject(format!(
                "Query contains forbidden operation: {}",
                keyword
            ));
        }
    }

    // Rule 3: SELECT-only
    if !lower.trim().starts_with("select") {
        return ValidationVerdict::reject("Only SELECT queries are allowed");
    }

    // Rule 4: every identifier following FROM or JOIN is a referenced table
    let table_pattern = Regex::new(r"(?:from|join)\s+(\w+)").expect("static regex");
    let referenced: BTreeSet<String> = table_pattern
        .captures_iter(&lower)
        .map(|c| c[1].to_string())
        .collect();

    if referenced.is_empty() {
        return ValidationVerdict::reject("No valid tables found in query");
    }

    // Rule 5: referenced tables must exist in the catalog
    let valid_lower: BTreeSet<String> = valid_tables.iter().map(|t| t.to_lowercase()).collect();
    let invalid: Vec<&String> = referenced
        .iter()
        .filter(|t| !valid_lower.contains(*t))
        .collect();

    if !invalid.is_empty() {
        return reject_unknown_tables(&invalid, valid_tables);
    }

    // Rule 6: FROM-clause shape
    let from_pattern = Regex::new(r"from\s+\w+").expect("static regex");
    if !from_pattern.is_match(&lower) {
        return ValidationVerdict::reject("Invalid query structure: Missing FROM clause");
    }

    // Rule 7: no comment markers
    if text.contains("--") || text.contains("/*") {
        return ValidationVerdict::reject("SQL comments are not allowed");
    }

    // Rule 8: at most one statement, semicolon only at the very end
    let semicolons = text.matches(';').count();
    let interior_semicolon = if text.ends_with(';') {
        semicolons > 1
    } else {
        semicolons > 0
    };
    if interior_semicolon {
        return ValidationVerdict::reject("Multiple SQL statements are not allowed");
    }

    ValidationVerdict::accept()
}

fn reject_unknown_tables(invalid: &[&String], valid_tables: &[String]) -> ValidationVerdict {
    let mut suggestions = Vec::new();
    for unknown in invalid {
        let similar = similar_tables(unknown.as_str(), valid_tables);
        if !similar.is_empty() {
            suggestions.push(format!(
                "Instead of '{}', did you mean: {}?",
                unknown,
                similar.join(", ")
            ));
        }
    }

    let names: Vec<String> = invalid.iter().map(|t| t.to_string()).collect();
    let mut reason = format!("Invalid tables in query: {}. ", names.join(", "));
    if suggestions.is_empty() {
        let mut sorted: Vec<&String> = valid_tables.iter().collect();
        sorted.sort();
        reason.push_str(&format!(
            "\nValid tables are: {}",
            sorted
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    } else {
        reason.push('\n');
        reason.push_str(&suggestions.join("\n"));
    }

    ValidationVerdict {
        accepted: false,
        reason: Some(reason),
        suggestions,
    }
}

/// Substring containment first; if that yields nothing, a jaro-winkler pass
/// catches near-misses like `prodcut`.
fn similar_tables(unknown: &str, valid_tables: &[String]) -> Vec<String> {
    let contained: Vec<String> = valid_tables
        .iter()
        .filter(|candidate| candidate.to_lowercase().contains(unknown))
        .cloned()
        .collect();
    if !contained.is_empty() {
        return contained;
    }

    let mut scored: Vec<(f64, &String)> = valid_tables
        .iter()
        .map(|candidate| (jaro_winkler(unknown, &candidate.to_lowercase()), candidate))
        .filter(|(score, _)| *score >= SUGGESTION_SIMILARITY)
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().map(|(_, t)| t.clone()).collect()
}
