//! Default values for every configuration option.

use std::path::PathBuf;

use nameplate_core::{CanonicalField, DEFAULT_REQUIRED_FIELDS};

/// At or below this many pending images, process them one by one.
pub const DEFAULT_BATCH_THRESHOLD: usize = 5;

/// Largest number of images submitted in a single bulk job.
pub const DEFAULT_MAX_BULK_SIZE: usize = 500;

/// Seconds between bulk job status checks.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Seconds to wait for a bulk job before giving up.
pub const DEFAULT_MAX_WAIT_SECS: u64 = 3600;

/// Minimum fuzzy score for a raw key to match an alias.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

pub const DEFAULT_MODEL: &str = "pixtral-12b-2409";
pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai/v1";
pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub fn required_fields() -> Vec<CanonicalField> {
    DEFAULT_REQUIRED_FIELDS.to_vec()
}

pub fn input_dir() -> PathBuf {
    PathBuf::from("input")
}

pub fn output_dir() -> PathBuf {
    PathBuf::from("output")
}

pub fn data_dir() -> PathBuf {
    PathBuf::from("data")
}

pub fn mappings_file() -> PathBuf {
    PathBuf::from("config/field_mappings.yaml")
}

pub fn logs_dir() -> PathBuf {
    PathBuf::from("logs")
}
