//! Aggregate reports over processed records and re-validation of saved files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use nameplate_core::{validate, CanonicalField, NameplateRecord, ProcessingSummary};

use crate::output::{load_json_safe, OutputStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingInfo {
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub total_images: usize,
    pub elapsed_secs: f64,
}

impl From<&ProcessingSummary> for ProcessingInfo {
    fn from(summary: &ProcessingSummary) -> Self {
        Self {
            mode: summary.mode.to_string(),
            job_id: summary.job_id.clone(),
            total_images: summary.total_images,
            elapsed_secs: summary.elapsed_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportStatistics {
    /// Number of records the report covers.
    pub total_records: usize,
    pub valid_results: usize,
    /// Valid records over all records, in percent.
    pub success_rate: f64,
    pub average_completeness: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAnalysis {
    /// How many records carry each required field.
    pub field_counts: BTreeMap<CanonicalField, usize>,
    /// Up to five fields with the highest counts.
    pub most_found_fields: Vec<(CanonicalField, usize)>,
}

/// Written to `reports/relatorio_completo_<ts>.json` on request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullReport {
    pub timestamp: DateTime<Utc>,
    pub processing_info: ProcessingInfo,
    pub statistics: ReportStatistics,
    pub field_analysis: FieldAnalysis,
}

impl FullReport {
    /// Build a report from the metadata already sealed into `records`.
    /// Unsealed records count as invalid with zero completeness.
    pub fn build(
        records: &[NameplateRecord],
        required: &[CanonicalField],
        processing_info: ProcessingInfo,
    ) -> Self {
        let total = records.len();
        let valid = records
            .iter()
            .filter(|r| r.validation().is_some_and(|v| v.valid))
            .count();
        let completeness_sum: f64 = records
            .iter()
            .map(|r| r.validation().map_or(0.0, |v| v.completeness))
            .sum();

        let mut field_counts = BTreeMap::new();
        for record in records {
            for field in required {
                if record.get(*field).is_some_and(|v| !v.trim().is_empty()) {
                    *field_counts.entry(*field).or_insert(0) += 1;
                }
            }
        }
        let mut most_found_fields: Vec<(CanonicalField, usize)> =
            field_counts.iter().map(|(f, c)| (*f, *c)).collect();
        // stable sort keeps schema order among ties
        most_found_fields.sort_by(|a, b| b.1.cmp(&a.1));
        most_found_fields.truncate(5);

        let (success_rate, average_completeness) = if total == 0 {
            (0.0, 0.0)
        } else {
            (
                valid as f64 / total as f64 * 100.0,
                completeness_sum / total as f64,
            )
        };

        Self {
            timestamp: Utc::now(),
            processing_info,
            statistics: ReportStatistics {
                total_records: total,
                valid_results: valid,
                success_rate,
                average_completeness,
            },
            field_analysis: FieldAnalysis {
                field_counts,
                most_found_fields,
            },
        }
    }
}

/// Result of re-checking one saved record file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileValidation {
    pub file: PathBuf,
    pub valid: bool,
    pub completeness: f64,
    pub missing: Vec<CanonicalField>,
}

/// Re-validate every saved record against the current mandatory-field list.
/// Files that cannot be read as records are skipped.
pub async fn revalidate(store: &OutputStore, required: &[CanonicalField]) -> Vec<FileValidation> {
    let mut results = Vec::new();
    for file in store.list_record_files().await {
        let Some(record) = load_json_safe::<NameplateRecord>(&file).await else {
            warn!(file = %file.display(), "Skipping unreadable record file");
            continue;
        };
        let validation = validate(&record, required);
        results.push(FileValidation {
            file,
            valid: validation.valid,
            completeness: validation.completeness,
            missing: validation.missing,
        });
    }
    let valid = results.iter().filter(|r| r.valid).count();
    info!(files = results.len(), valid, "Re-validated saved records");
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use nameplate_core::{ProcessingMode, RecordSource, DEFAULT_REQUIRED_FIELDS};

    fn sealed(fields: &[(CanonicalField, &str)]) -> NameplateRecord {
        let mut record = NameplateRecord::new();
        for (field, value) in fields {
            record.insert(*field, *value);
        }
        record.seal(
            RecordSource::new("p.jpg", ProcessingMode::Sync),
            &DEFAULT_REQUIRED_FIELDS,
        )
    }

    fn info() -> ProcessingInfo {
        ProcessingInfo {
            mode: "sync".into(),
            job_id: None,
            total_images: 2,
            elapsed_secs: 1.5,
        }
    }

    #[test]
    fn report_counts_valid_and_fields() {
        use CanonicalField::*;
        let full = sealed(&[
            (Identification, "TAG-1"),
            (Manufacturer, "ACME"),
            (Category, "II"),
            (MaxWorkingPressure, "10 bar"),
            (OrderNumber, "77"),
        ]);
        let partial = sealed(&[(Manufacturer, "ACME"), (Category, "I")]);

        let report = FullReport::build(&[full, partial], &DEFAULT_REQUIRED_FIELDS, info());
        assert_eq!(report.statistics.total_records, 2);
        assert_eq!(report.statistics.valid_results, 1);
        assert_eq!(report.statistics.success_rate, 50.0);
        assert_eq!(report.statistics.average_completeness, 70.0);
        assert_eq!(report.field_analysis.field_counts[&Manufacturer], 2);
        assert_eq!(report.field_analysis.field_counts[&OrderNumber], 1);
        assert_eq!(report.field_analysis.most_found_fields.len(), 5);
        assert_eq!(report.field_analysis.most_found_fields[0].1, 2);
    }

    #[test]
    fn empty_report_is_zeroed() {
        let report = FullReport::build(&[], &DEFAULT_REQUIRED_FIELDS, info());
        assert_eq!(report.statistics.success_rate, 0.0);
        assert!(report.field_analysis.field_counts.is_empty());
    }

    #[tokio::test]
    async fn revalidates_saved_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::from_dirs(dir.path(), dir.path().join("reports"));
        store
            .save_records(&[sealed(&[(CanonicalField::Manufacturer, "ACME")])], "20240101_000000")
            .await;
        tokio::fs::write(dir.path().join("broken.json"), "{").await.unwrap();

        let results = revalidate(&store, &[CanonicalField::Manufacturer]).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].valid);
        assert_eq!(results[0].completeness, 100.0);
    }
}
