//! Runtime configuration schema, deserialized from `nameplate.yaml`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use nameplate_core::CanonicalField;

use crate::defaults;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NameplateConfig {
    /// Vision OCR / bulk API access
    pub api: ApiConfig,
    /// Dispatch thresholds and normalizer tuning
    pub processing: ProcessingConfig,
    /// Mandatory-field list
    pub validation: ValidationConfig,
    /// Input, output and state locations
    pub paths: PathsConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: defaults::DEFAULT_MODEL.to_string(),
            base_url: defaults::DEFAULT_BASE_URL.to_string(),
            temperature: defaults::DEFAULT_TEMPERATURE,
            max_tokens: defaults::DEFAULT_MAX_TOKENS,
            timeout_secs: defaults::DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Processing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub batch_threshold: usize,
    pub max_bulk_size: usize,
    pub poll_interval_secs: u64,
    pub max_wait_secs: u64,
    pub similarity_threshold: f64,
    /// Use the canned mock backends instead of the HTTP API.
    pub use_mock_backend: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_threshold: defaults::DEFAULT_BATCH_THRESHOLD,
            max_bulk_size: defaults::DEFAULT_MAX_BULK_SIZE,
            poll_interval_secs: defaults::DEFAULT_POLL_INTERVAL_SECS,
            max_wait_secs: defaults::DEFAULT_MAX_WAIT_SECS,
            similarity_threshold: defaults::DEFAULT_SIMILARITY_THRESHOLD,
            use_mock_backend: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub required_fields: Vec<CanonicalField>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            required_fields: defaults::required_fields(),
        }
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub data_dir: PathBuf,
    pub mappings_file: PathBuf,
    pub logs_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: defaults::input_dir(),
            output_dir: defaults::output_dir(),
            data_dir: defaults::data_dir(),
            mappings_file: defaults::mappings_file(),
            logs_dir: defaults::logs_dir(),
        }
    }
}

impl PathsConfig {
    /// Per-image record documents.
    pub fn json_dir(&self) -> PathBuf {
        self.output_dir.join("json")
    }

    /// Summaries and full reports.
    pub fn reports_dir(&self) -> PathBuf {
        self.output_dir.join("reports")
    }

    /// Bulk job registry.
    pub fn batch_dir(&self) -> PathBuf {
        self.output_dir.join("batch")
    }

    pub fn learned_mappings_file(&self) -> PathBuf {
        self.data_dir.join("learned_mappings.json")
    }

    pub fn job_registry_file(&self) -> PathBuf {
        self.batch_dir().join("batch_jobs.json")
    }

    /// Every directory the pipeline writes into.
    pub fn writable_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.input_dir.clone(),
            self.json_dir(),
            self.reports_dir(),
            self.batch_dir(),
            self.data_dir.clone(),
            self.logs_dir.clone(),
        ]
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Also write NDJSON logs to `paths.logs_dir`.
    pub json_file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::DEFAULT_LOG_LEVEL.to_string(),
            json_file: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg: NameplateConfig = serde_yaml::from_str(
            "processing:\n  batch_threshold: 10\nvalidation:\n  required_fields: [fabricante]\n",
        )
        .unwrap();
        assert_eq!(cfg.processing.batch_threshold, 10);
        assert_eq!(cfg.processing.poll_interval_secs, defaults::DEFAULT_POLL_INTERVAL_SECS);
        assert_eq!(cfg.validation.required_fields, vec![CanonicalField::Manufacturer]);
        assert_eq!(cfg.api.model, defaults::DEFAULT_MODEL);
    }

    #[test]
    fn derived_paths() {
        let paths = PathsConfig::default();
        assert_eq!(paths.json_dir(), PathBuf::from("output/json"));
        assert_eq!(paths.job_registry_file(), PathBuf::from("output/batch/batch_jobs.json"));
        assert_eq!(paths.learned_mappings_file(), PathBuf::from("data/learned_mappings.json"));
    }
}
