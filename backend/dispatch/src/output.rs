//! JSON documents written by a processing run: one file per record, a summary
//! per invocation and the optional full report.
//!
//! Write failures are logged and reported as `false`; read failures yield
//! `None`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{error, info, warn};

use nameplate_config::PathsConfig;
use nameplate_core::{ImageFailure, NameplateRecord, ProcessingMode, ProcessingSummary};

/// Timestamp used in generated file names, e.g. `20240131_142501`.
pub fn file_timestamp(at: DateTime<Local>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// What lands in `reports/resumo_<ts>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryDocument {
    pub timestamp: DateTime<Utc>,
    pub mode: ProcessingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub total_images: usize,
    pub success: usize,
    pub errors: usize,
    pub success_rate: f64,
    pub elapsed_secs: f64,
    pub files_written: usize,
    #[serde(default)]
    pub failures: Vec<ImageFailure>,
}

impl SummaryDocument {
    pub fn from_summary(summary: &ProcessingSummary, files_written: usize) -> Self {
        Self {
            timestamp: summary.finished_at.unwrap_or_else(Utc::now),
            mode: summary.mode,
            job_id: summary.job_id.clone(),
            total_images: summary.total_images,
            success: summary.success,
            errors: summary.errors,
            success_rate: summary.success_rate,
            elapsed_secs: summary.elapsed_secs,
            files_written,
            failures: summary.failures.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutputStore {
    json_dir: PathBuf,
    reports_dir: PathBuf,
}

impl OutputStore {
    pub fn new(paths: &PathsConfig) -> Self {
        Self::from_dirs(paths.json_dir(), paths.reports_dir())
    }

    pub fn from_dirs(json_dir: impl Into<PathBuf>, reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            json_dir: json_dir.into(),
            reports_dir: reports_dir.into(),
        }
    }

    pub fn json_dir(&self) -> &Path {
        &self.json_dir
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// Write each record as `placa_<ts>_<seq>_ocr.json`; returns how many were written.
    pub async fn save_records(&self, records: &[NameplateRecord], timestamp: &str) -> usize {
        let mut written = 0;
        for (i, record) in records.iter().enumerate() {
            let path = self
                .json_dir
                .join(format!("placa_{}_{:03}_ocr.json", timestamp, i + 1));
            if save_json(&path, record).await {
                written += 1;
            }
        }
        info!(written, total = records.len(), dir = %self.json_dir.display(), "Saved records");
        written
    }

    /// Write `reports/resumo_<ts>.json`.
    pub async fn save_summary(&self, document: &SummaryDocument, timestamp: &str) -> bool {
        let path = self.reports_dir.join(format!("resumo_{timestamp}.json"));
        save_json(&path, document).await
    }

    /// Write a single-image record as `<stem>_ocr.json`.
    pub async fn save_single(&self, record: &NameplateRecord, image: &Path) -> Option<PathBuf> {
        let stem = image
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let path = self.json_dir.join(format!("{stem}_ocr.json"));
        save_json(&path, record).await.then_some(path)
    }

    pub async fn save_report<T: Serialize>(&self, report: &T, timestamp: &str) -> Option<PathBuf> {
        let path = self
            .reports_dir
            .join(format!("relatorio_completo_{timestamp}.json"));
        save_json(&path, report).await.then_some(path)
    }

    /// Saved record files, sorted by name.
    pub async fn list_record_files(&self) -> Vec<PathBuf> {
        let mut entries = match fs::read_dir(&self.json_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.json_dir.display(), error = %e, "Cannot read output directory");
                return Vec::new();
            }
        };
        let mut files = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json") {
                files.push(path);
            }
        }
        files.sort();
        files
    }
}

/// Pretty-print `value` to `path`, creating parent directories.
pub async fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> bool {
    let body = match serde_json::to_string_pretty(value) {
        Ok(body) => body,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to serialize JSON");
            return false;
        }
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(path = %parent.display(), error = %e, "Failed to create directory");
            return false;
        }
    }
    match fs::write(path, body).await {
        Ok(()) => true,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to write JSON");
            false
        }
    }
}

/// Read and parse `path`, or `None` if either step fails.
pub async fn load_json_safe<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read JSON");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to parse JSON");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nameplate_core::{CanonicalField, RecordSource, DEFAULT_REQUIRED_FIELDS};

    fn record(tag: &str) -> NameplateRecord {
        let mut record = NameplateRecord::new();
        record.insert(CanonicalField::Tag, tag);
        record.seal(RecordSource::new("x.jpg", ProcessingMode::Sync), &DEFAULT_REQUIRED_FIELDS)
    }

    #[tokio::test]
    async fn records_get_sequenced_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::from_dirs(dir.path().join("json"), dir.path().join("reports"));

        let written = store
            .save_records(&[record("A"), record("B")], "20240131_142501")
            .await;
        assert_eq!(written, 2);

        let files = store.list_record_files().await;
        assert_eq!(
            files,
            vec![
                dir.path().join("json/placa_20240131_142501_001_ocr.json"),
                dir.path().join("json/placa_20240131_142501_002_ocr.json"),
            ]
        );
        let back: NameplateRecord = load_json_safe(&files[1]).await.unwrap();
        assert_eq!(back.get(CanonicalField::Tag), Some("B"));
    }

    #[tokio::test]
    async fn single_uses_image_stem() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::from_dirs(dir.path(), dir.path());
        let path = store
            .save_single(&record("T"), Path::new("input/caldeira_03.png"))
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("caldeira_03_ocr.json"));
    }

    #[tokio::test]
    async fn unreadable_json_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ nope").await.unwrap();
        assert!(load_json_safe::<serde_json::Value>(&path).await.is_none());
        assert!(load_json_safe::<serde_json::Value>(&dir.path().join("missing.json")).await.is_none());
    }

    #[tokio::test]
    async fn summary_document_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::from_dirs(dir.path().join("json"), dir.path().join("reports"));
        let mut summary = ProcessingSummary::start(ProcessingMode::Sync, 1);
        summary.record_failure("a.jpg", "boom");
        summary.finish();

        let doc = SummaryDocument::from_summary(&summary, 0);
        assert!(store.save_summary(&doc, "20240101_000000").await);
        let back: SummaryDocument =
            load_json_safe(&dir.path().join("reports/resumo_20240101_000000.json")).await.unwrap();
        assert_eq!(back.errors, 1);
        assert_eq!(back.failures[0].source_file, "a.jpg");
    }
}
