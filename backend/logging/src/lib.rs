//! Logging setup for the nameplate tools.
//!
//! Human-readable lines go to stderr; when a log directory is given, NDJSON
//! records are also appended to a daily rolling file.

pub mod logger;

pub use logger::{init_logger, LOG_FILE_PREFIX};
