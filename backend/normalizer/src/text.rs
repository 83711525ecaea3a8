//! Text cleaning shared by every matching strategy.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").unwrap());

/// Comparison form: lowercase, punctuation to spaces, whitespace collapsed.
pub fn clean_text(text: &str) -> String {
    let lower = text.to_lowercase();
    let spaced = PUNCTUATION.replace_all(&lower, " ");
    WHITESPACE.replace_all(&spaced, " ").trim().to_string()
}

/// Key form for unmatched fields: lowercase snake case, e.g. `"Inspection Date:"`
/// becomes `inspection_date`.
pub fn clean_field_name(text: &str) -> String {
    let lower = text.to_lowercase();
    let underscored = PUNCTUATION.replace_all(&lower, "_");
    let underscored = WHITESPACE.replace_all(&underscored, "_");
    UNDERSCORES
        .replace_all(&underscored, "_")
        .trim_matches('_')
        .to_string()
}

/// Whether a raw value carries nothing worth keeping.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// String form of a raw value; `None` for empty values.
pub fn value_to_text(value: &Value) -> Option<String> {
    if is_empty_value(value) {
        return None;
    }
    match value {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
