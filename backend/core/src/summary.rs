//! Aggregate outcome of one dispatch invocation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::{NameplateRecord, ProcessingMode};

/// A single image that could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFailure {
    pub source_file: String,
    pub error: String,
}

/// Counts, timing and results for one invocation of the dispatch policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingSummary {
    pub mode: ProcessingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub total_images: usize,
    pub success: usize,
    pub errors: usize,
    /// Successes over total attempted, in percent. Set by [`finish`](Self::finish).
    pub success_rate: f64,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub elapsed_secs: f64,
    #[serde(default)]
    pub records: Vec<NameplateRecord>,
    #[serde(default)]
    pub failures: Vec<ImageFailure>,
}

impl ProcessingSummary {
    pub fn start(mode: ProcessingMode, total_images: usize) -> Self {
        Self {
            mode,
            job_id: None,
            total_images,
            success: 0,
            errors: 0,
            success_rate: 0.0,
            started_at: Utc::now(),
            finished_at: None,
            elapsed_secs: 0.0,
            records: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn record_success(&mut self, record: NameplateRecord) {
        self.success += 1;
        self.records.push(record);
    }

    pub fn record_failure(&mut self, source_file: impl Into<String>, error: impl Into<String>) {
        self.errors += 1;
        self.failures.push(ImageFailure {
            source_file: source_file.into(),
            error: error.into(),
        });
    }

    /// Close the summary: images never accounted for count as errors, then
    /// the success rate and elapsed time are computed once.
    pub fn finish(&mut self) {
        let accounted = self.success + self.errors;
        if accounted < self.total_images {
            self.errors += self.total_images - accounted;
        }
        self.success_rate = if self.total_images == 0 {
            0.0
        } else {
            self.success as f64 / self.total_images as f64 * 100.0
        };
        let finished = Utc::now();
        self.elapsed_secs = (finished - self.started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        self.finished_at = Some(finished);
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_is_over_attempted() {
        let mut summary = ProcessingSummary::start(ProcessingMode::Sync, 4);
        summary.record_success(NameplateRecord::new());
        summary.record_success(NameplateRecord::new());
        summary.record_success(NameplateRecord::new());
        summary.record_failure("d.jpg", "OCR timeout");
        summary.finish();
        assert_eq!(summary.success_rate, 75.0);
        assert_eq!(summary.errors, 1);
        assert!(summary.is_finished());
    }

    #[test]
    fn unaccounted_images_are_errors() {
        let mut summary = ProcessingSummary::start(ProcessingMode::Batch, 3);
        summary.record_success(NameplateRecord::new());
        summary.finish();
        assert_eq!(summary.errors, 2);
        assert!((summary.success_rate - 100.0 / 3.0).abs() < 1e-9);
    }
}
