//! `nameplate-config`: runtime configuration for nameplate processing.
//!
//! Provides:
//! - Typed config schema (API, processing thresholds, mandatory fields, paths)
//! - YAML read/write with atomic backup rotation
//! - `${ENV_VAR}` substitution and well-known env overrides
//! - Range and credential validation

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use env::{
    apply_env_overrides, apply_env_overrides_with, collect_referenced_vars, resolve_env_vars,
    resolve_env_vars_with, MissingEnvVarError,
};
pub use io::{config_dir, config_file_path, ensure_directories, load_config, write_config};
pub use schema::{
    ApiConfig, LoggingConfig, NameplateConfig, PathsConfig, ProcessingConfig, ValidationConfig,
};
pub use validation::{ensure_ready, validate, ConfigValidationError, ValidationReport};

use std::path::Path;

use anyhow::{Context, Result};

/// Load the config file, substitute `${VAR}` references, apply env overrides
/// and log validation findings.
///
/// This is the main entry point for loading a config at runtime. Validation
/// errors are only logged here; call [`ensure_ready`] before processing.
pub async fn load_and_prepare(path: &Path) -> Result<NameplateConfig> {
    let value = io::load_config_value(path).await?;
    let value = resolve_env_vars(&value).context("Failed to resolve env vars in config")?;

    let mut config: NameplateConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;
    apply_env_overrides(&mut config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }

    Ok(config)
}
