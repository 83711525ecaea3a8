//! Mandatory-field validation and completeness scoring.

use serde::{Deserialize, Serialize};

use crate::record::NameplateRecord;
use crate::schema::CanonicalField;

/// Outcome of checking a record against the mandatory-field list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    /// Percentage of mandatory fields present, 0–100.
    pub completeness: f64,
    pub found: Vec<CanonicalField>,
    pub missing: Vec<CanonicalField>,
    pub total_required: usize,
}

/// Check `record` against `required`, in the order given.
///
/// A field counts as found only when present and non-blank. An empty
/// `required` list is trivially satisfied (completeness 100).
pub fn validate(record: &NameplateRecord, required: &[CanonicalField]) -> ValidationResult {
    let (found, missing): (Vec<CanonicalField>, Vec<CanonicalField>) = required
        .iter()
        .copied()
        .partition(|field| record.get(*field).is_some_and(|v| !v.trim().is_empty()));

    let total_required = required.len();
    let completeness = if total_required == 0 {
        100.0
    } else {
        found.len() as f64 / total_required as f64 * 100.0
    };

    ValidationResult {
        valid: missing.is_empty(),
        completeness,
        found,
        missing,
        total_required,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DEFAULT_REQUIRED_FIELDS;

    fn complete_record() -> NameplateRecord {
        let mut record = NameplateRecord::new();
        record.insert(CanonicalField::Identification, "TAG-001");
        record.insert(CanonicalField::Manufacturer, "ACME");
        record.insert(CanonicalField::Category, "I");
        record.insert(CanonicalField::MaxWorkingPressure, "14.5 kgf/cm²");
        record.insert(CanonicalField::OrderNumber, "1234");
        record
    }

    #[test]
    fn all_required_present_is_valid() {
        let result = validate(&complete_record(), &DEFAULT_REQUIRED_FIELDS);
        assert!(result.valid);
        assert_eq!(result.completeness, 100.0);
        assert_eq!(result.total_required, 5);
        assert!(result.missing.is_empty());
    }

    #[test]
    fn removing_one_field_drops_completeness() {
        for removed in DEFAULT_REQUIRED_FIELDS {
            let mut record = NameplateRecord::new();
            for field in DEFAULT_REQUIRED_FIELDS.iter().filter(|f| **f != removed) {
                record.insert(*field, "x");
            }
            let result = validate(&record, &DEFAULT_REQUIRED_FIELDS);
            assert!(!result.valid);
            assert_eq!(result.completeness, 4.0 / 5.0 * 100.0);
            assert_eq!(result.missing, vec![removed]);
        }
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let mut record = complete_record();
        record.insert(CanonicalField::Manufacturer, "   ");
        let result = validate(&record, &DEFAULT_REQUIRED_FIELDS);
        assert_eq!(result.missing, vec![CanonicalField::Manufacturer]);
    }

    #[test]
    fn validation_is_idempotent() {
        let record = complete_record();
        assert_eq!(
            validate(&record, &DEFAULT_REQUIRED_FIELDS),
            validate(&record, &DEFAULT_REQUIRED_FIELDS)
        );
    }

    #[test]
    fn empty_requirement_list_is_complete() {
        let result = validate(&NameplateRecord::new(), &[]);
        assert!(result.valid);
        assert_eq!(result.completeness, 100.0);
    }
}
