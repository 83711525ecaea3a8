//! Per-category value cleanup applied once a field is resolved.

use once_cell::sync::Lazy;
use regex::Regex;

use nameplate_core::{is_allowed_category, CanonicalField, FieldCategory};

static NOT_IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d\-/]").unwrap());

/// Normalized value for `field`, or `None` if nothing usable remains.
///
/// Category values outside the allowed set are rejected.
pub fn normalize_value(field: CanonicalField, value: &str) -> Option<String> {
    let trimmed = value.trim();
    let normalized = match field.category() {
        FieldCategory::NumericIdentifier => NOT_IDENTIFIER.replace_all(trimmed, "").into_owned(),
        FieldCategory::Pressure => trimmed.replace(',', "."),
        FieldCategory::Category => {
            let upper = trimmed.to_uppercase();
            if !is_allowed_category(&upper) {
                return None;
            }
            upper
        }
        FieldCategory::Text => trimmed.to_string(),
    };
    (!normalized.is_empty()).then_some(normalized)
}
