//! Config validation: range and credential checks with user-friendly messages.

use std::collections::HashSet;

use thiserror::Error;

use nameplate_core::NameplateError;

use crate::schema::NameplateConfig;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    /// Turn the report into the fatal configuration error, if it has errors.
    pub fn into_result(self) -> Result<(), NameplateError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        let message = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        Err(NameplateError::Config(message))
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &NameplateConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_api(config, &mut report);
    validate_processing(config, &mut report);
    validate_required_fields(config, &mut report);
    report
}

/// Fail fast before any processing starts.
pub fn ensure_ready(config: &NameplateConfig) -> Result<(), NameplateError> {
    validate(config).into_result()
}

fn validate_api(config: &NameplateConfig, report: &mut ValidationReport) {
    if config.processing.use_mock_backend {
        return;
    }
    let api = &config.api;
    if !api.has_api_key() {
        report.error("api.api_key", "API key is required (set MISTRAL_API_KEY)");
    }
    if api.model.trim().is_empty() {
        report.error("api.model", "Model name cannot be empty");
    }
    if !api.base_url.starts_with("http://") && !api.base_url.starts_with("https://") {
        report.error("api.base_url", format!("Not an http(s) URL: {}", api.base_url));
    }
    if !(0.0..=2.0).contains(&api.temperature) {
        report.warn("api.temperature", "Temperature outside 0.0–2.0");
    }
}

fn validate_processing(config: &NameplateConfig, report: &mut ValidationReport) {
    let p = &config.processing;
    if !(0.0..=1.0).contains(&p.similarity_threshold) {
        report.error(
            "processing.similarity_threshold",
            format!("Must be between 0.0 and 1.0, got {}", p.similarity_threshold),
        );
    }
    if p.poll_interval_secs == 0 {
        report.error("processing.poll_interval_secs", "Must be > 0");
    }
    if p.max_bulk_size == 0 {
        report.error("processing.max_bulk_size", "Must be > 0");
    }
    if p.batch_threshold == 0 {
        report.warn("processing.batch_threshold", "0 sends every invocation to the bulk path");
    }
    if p.max_wait_secs < p.poll_interval_secs {
        report.warn(
            "processing.max_wait_secs",
            "Shorter than one poll interval; bulk jobs will time out after a single check",
        );
    }
}

fn validate_required_fields(config: &NameplateConfig, report: &mut ValidationReport) {
    let fields = &config.validation.required_fields;
    if fields.is_empty() {
        report.warn("validation.required_fields", "No mandatory fields; every record is valid");
    }
    let mut seen = HashSet::new();
    for field in fields {
        if !seen.insert(field) {
            report.warn(
                "validation.required_fields",
                format!("Duplicate mandatory field: {field}"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> NameplateConfig {
        let mut cfg = NameplateConfig::default();
        cfg.api.api_key = Some("sk-test".into());
        cfg
    }

    #[test]
    fn defaults_with_key_are_valid() {
        assert!(validate(&configured()).is_valid());
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let err = ensure_ready(&NameplateConfig::default()).unwrap_err();
        assert!(matches!(err, NameplateError::Config(msg) if msg.contains("api.api_key")));
    }

    #[test]
    fn mock_backend_needs_no_key() {
        let mut cfg = NameplateConfig::default();
        cfg.processing.use_mock_backend = true;
        assert!(ensure_ready(&cfg).is_ok());
    }

    #[test]
    fn threshold_out_of_range() {
        let mut cfg = configured();
        cfg.processing.similarity_threshold = 1.5;
        let report = validate(&cfg);
        assert!(report.errors.iter().any(|e| e.path == "processing.similarity_threshold"));
    }

    #[test]
    fn duplicate_required_field_warns() {
        let mut cfg = configured();
        cfg.validation.required_fields.push(nameplate_core::CanonicalField::Manufacturer);
        let report = validate(&cfg);
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
    }
}
