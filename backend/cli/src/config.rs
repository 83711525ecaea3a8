use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use nameplate_config::{
    config_dir, config_file_path, ensure_directories, ensure_ready, load_and_prepare, write_config,
    NameplateConfig,
};
use nameplate_dispatch::{DispatchPolicy, JobRegistry, OutputStore};
use nameplate_normalizer::FieldNormalizer;
use nameplate_ocr::Backends;

/// Loaded configuration plus where it came from.
pub struct AppConfig {
    pub path: PathBuf,
    pub config: NameplateConfig,
}

impl AppConfig {
    /// `--config` wins, then `NAMEPLATE_CONFIG`, then the config directory.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        match explicit {
            Some(path) => path.to_path_buf(),
            None => config_file_path(&config_dir()),
        }
    }

    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(explicit);
        let config = load_and_prepare(&path).await?;
        Ok(Self { path, config })
    }

    /// Force the offline mock backends.
    pub fn use_mock(&mut self) {
        self.config.processing.use_mock_backend = true;
    }

    pub fn normalizer(&self) -> Arc<FieldNormalizer> {
        let p = &self.config.paths;
        Arc::new(FieldNormalizer::load(
            &p.mappings_file,
            &p.learned_mappings_file(),
            self.config.processing.similarity_threshold,
        ))
    }

    pub async fn registry(&self) -> Arc<JobRegistry> {
        Arc::new(JobRegistry::open(self.config.paths.job_registry_file()).await)
    }

    pub fn output(&self) -> OutputStore {
        OutputStore::new(&self.config.paths)
    }

    /// Validate, create output directories and wire up the dispatch policy.
    pub async fn policy(&self) -> Result<DispatchPolicy> {
        ensure_ready(&self.config)?;
        ensure_directories(&self.config).await?;
        let backends = Backends::from_config(&self.config)?;
        Ok(DispatchPolicy::new(
            &self.config,
            backends,
            self.normalizer(),
            self.registry().await,
        ))
    }
}

/// Write a config file holding every default.
pub async fn init(explicit: Option<&Path>, force: bool) -> Result<()> {
    let path = AppConfig::resolve_path(explicit);
    if path.exists() && !force {
        bail!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    write_config(&NameplateConfig::default(), &path)
        .await
        .with_context(|| format!("Failed to initialize config at {}", path.display()))?;
    info!(path = %path.display(), "Config initialized");
    println!("Config written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nameplate.yaml");

        init(Some(&path), false).await.unwrap();
        assert!(init(Some(&path), false).await.is_err());
        init(Some(&path), true).await.unwrap();

        let loaded = AppConfig::load(Some(&path)).await.unwrap();
        assert_eq!(loaded.config.processing.batch_threshold, 5);
    }

    #[tokio::test]
    async fn mock_flag_skips_key_check() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = AppConfig::load(Some(&dir.path().join("absent.yaml"))).await.unwrap();
        app.config.api.api_key = None;
        app.config.paths.output_dir = dir.path().join("output");
        app.config.paths.input_dir = dir.path().join("input");
        app.config.paths.data_dir = dir.path().join("data");
        app.config.paths.logs_dir = dir.path().join("logs");
        assert!(app.policy().await.is_err());

        app.use_mock();
        assert!(app.policy().await.is_ok());
    }
}
