//! Config file read/write with atomic backup rotation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::schema::NameplateConfig;

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "nameplate.yaml";

/// Number of rolling backups to keep.
const MAX_BACKUPS: usize = 3;

/// Resolve the config directory.
/// Priority: `NAMEPLATE_CONFIG_DIR` env > `~/.nameplate/` > `./.nameplate/`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("NAMEPLATE_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".nameplate"),
        None => PathBuf::from(".nameplate"),
    }
}

/// Resolve the config file: `NAMEPLATE_CONFIG` env, else `<config_dir>/nameplate.yaml`.
pub fn config_file_path(config_dir: &Path) -> PathBuf {
    if let Ok(file) = std::env::var("NAMEPLATE_CONFIG") {
        return PathBuf::from(file);
    }
    config_dir.join(CONFIG_FILE_NAME)
}

/// Read the config file as an untyped JSON tree, before env substitution.
///
/// Returns an empty object if the file doesn't exist (first run).
pub async fn load_config_value(path: &Path) -> Result<Value> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(Value::Object(Default::default()));
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let yaml: serde_yaml::Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    let value = match yaml {
        serde_yaml::Value::Null => Value::Object(Default::default()),
        other => serde_json::to_value(other)
            .with_context(|| format!("Unsupported YAML content in: {}", path.display()))?,
    };

    info!(path = %path.display(), "Loaded config");
    Ok(value)
}

/// Load and parse the config from disk without env processing.
pub async fn load_config(path: &Path) -> Result<NameplateConfig> {
    let value = load_config_value(path).await?;
    serde_json::from_value(value)
        .with_context(|| format!("Invalid config structure in: {}", path.display()))
}

/// Write config to disk atomically (write to temp file, rename).
///
/// Creates a rolling backup of the previous config before overwriting.
pub async fn write_config(config: &NameplateConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create config directory: {}", parent.display())
        })?;
    }

    if path.exists() {
        rotate_backups(path).await;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    let tmp_path = path.with_extension("yaml.tmp");
    fs::write(&tmp_path, yaml.as_bytes())
        .await
        .with_context(|| format!("Failed to write temp config: {}", tmp_path.display()))?;

    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to rename temp config to: {}", path.display()))?;

    info!(path = %path.display(), "Wrote config");
    Ok(())
}

/// Rotate backup files: nameplate.yaml.bak.1 → .bak.2 → ... → .bak.N
async fn rotate_backups(path: &Path) {
    for i in (1..MAX_BACKUPS).rev() {
        let old = path.with_extension(format!("yaml.bak.{i}"));
        let new = path.with_extension(format!("yaml.bak.{}", i + 1));
        if old.exists() {
            if let Err(e) = fs::rename(&old, &new).await {
                warn!("Failed to rotate backup {}: {}", old.display(), e);
            }
        }
    }

    let bak = path.with_extension("yaml.bak.1");
    if let Err(e) = fs::copy(path, &bak).await {
        warn!("Failed to create backup {}: {}", bak.display(), e);
    }
}

/// Create every directory the pipeline writes into.
pub async fn ensure_directories(config: &NameplateConfig) -> Result<()> {
    for dir in config.paths.writable_dirs() {
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("absent.yaml")).await.unwrap();
        assert_eq!(cfg.processing.batch_threshold, crate::defaults::DEFAULT_BATCH_THRESHOLD);
    }

    #[tokio::test]
    async fn write_then_load_keeps_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nameplate.yaml");

        let mut cfg = NameplateConfig::default();
        write_config(&cfg, &path).await.unwrap();
        cfg.processing.batch_threshold = 12;
        write_config(&cfg, &path).await.unwrap();

        let loaded = load_config(&path).await.unwrap();
        assert_eq!(loaded.processing.batch_threshold, 12);
        assert!(path.with_extension("yaml.bak.1").exists());
    }

    #[tokio::test]
    async fn empty_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nameplate.yaml");
        tokio::fs::write(&path, "").await.unwrap();
        let cfg = load_config(&path).await.unwrap();
        assert_eq!(cfg.logging.level, "info");
    }
}
