//! Routes each invocation to the immediate or deferred path by image count
//! and persists what comes back.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use nameplate_config::NameplateConfig;
use nameplate_core::{NameplateError, NameplateRecord, ProcessingMode, ProcessingSummary};
use nameplate_normalizer::FieldNormalizer;
use nameplate_ocr::Backends;

use crate::deferred::{DeferredPath, DeferredSettings};
use crate::immediate::ImmediatePath;
use crate::images::list_images;
use crate::output::{file_timestamp, OutputStore, SummaryDocument};
use crate::registry::JobRegistry;

pub struct DispatchPolicy {
    batch_threshold: usize,
    immediate: ImmediatePath,
    deferred: DeferredPath,
    output: OutputStore,
    input_dir: PathBuf,
}

impl DispatchPolicy {
    pub fn new(
        config: &NameplateConfig,
        backends: Backends,
        normalizer: Arc<FieldNormalizer>,
        registry: Arc<JobRegistry>,
    ) -> Self {
        let required = config.validation.required_fields.clone();
        Self {
            batch_threshold: config.processing.batch_threshold,
            immediate: ImmediatePath::new(backends.ocr, normalizer.clone(), required.clone()),
            deferred: DeferredPath::new(
                backends.bulk,
                normalizer,
                registry,
                required,
                DeferredSettings::from(&config.processing),
            ),
            output: OutputStore::new(&config.paths),
            input_dir: config.paths.input_dir.clone(),
        }
    }

    /// Up to the threshold goes immediate, anything above it deferred.
    pub fn mode_for(&self, count: usize) -> ProcessingMode {
        if count <= self.batch_threshold {
            ProcessingMode::Sync
        } else {
            ProcessingMode::Batch
        }
    }

    pub fn output(&self) -> &OutputStore {
        &self.output
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Process `images`, then write one file per record and a summary
    /// document. A deferred run that fails writes nothing.
    pub async fn process(
        &self,
        images: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<ProcessingSummary, NameplateError> {
        if images.is_empty() {
            return Err(NameplateError::NoImages(self.input_dir.display().to_string()));
        }

        let mode = self.mode_for(images.len());
        info!(
            images = images.len(),
            threshold = self.batch_threshold,
            %mode,
            "Dispatching images"
        );
        let summary = match mode {
            ProcessingMode::Sync => self.immediate.run(images).await,
            ProcessingMode::Batch => self.deferred.run(images, cancel).await?,
        };

        let timestamp = file_timestamp(Local::now());
        let written = self.output.save_records(&summary.records, &timestamp).await;
        if written < summary.records.len() {
            warn!(written, total = summary.records.len(), "Some records were not saved");
        }
        let document = SummaryDocument::from_summary(&summary, written);
        if !self.output.save_summary(&document, &timestamp).await {
            warn!("Summary document was not saved");
        }
        Ok(summary)
    }

    /// Process every supported image in the configured input directory.
    pub async fn process_dir(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ProcessingSummary, NameplateError> {
        let images = list_images(&self.input_dir).await;
        self.process(&images, cancel).await
    }

    /// Run one image through the immediate path and save it as
    /// `<stem>_ocr.json`. Returns the record and where it was written.
    pub async fn process_single(
        &self,
        image: &Path,
    ) -> Result<(NameplateRecord, Option<PathBuf>), NameplateError> {
        let record = self.immediate.process_one(image).await?;
        let saved = self.output.save_single(&record, image).await;
        if saved.is_none() {
            warn!(image = %image.display(), "Record was not saved");
        }
        Ok((record, saved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nameplate_normalizer::{LearnedMappingStore, MappingTable};

    fn config(root: &Path) -> NameplateConfig {
        let mut config = NameplateConfig::default();
        config.processing.use_mock_backend = true;
        config.processing.poll_interval_secs = 1;
        config.processing.max_wait_secs = 10;
        config.paths.input_dir = root.join("input");
        config.paths.output_dir = root.join("output");
        config.paths.data_dir = root.join("data");
        config
    }

    fn policy(config: &NameplateConfig) -> (DispatchPolicy, Arc<JobRegistry>) {
        let normalizer = Arc::new(FieldNormalizer::new(
            MappingTable::empty(),
            Arc::new(LearnedMappingStore::in_memory()),
            config.processing.similarity_threshold,
        ));
        let registry = Arc::new(JobRegistry::in_memory());
        let policy = DispatchPolicy::new(config, Backends::mock(), normalizer, registry.clone());
        (policy, registry)
    }

    async fn write_images(dir: &Path, count: usize) -> Vec<PathBuf> {
        tokio::fs::create_dir_all(dir).await.unwrap();
        let mut paths = Vec::new();
        for i in 0..count {
            let path = dir.join(format!("placa_{i:02}.png"));
            tokio::fs::write(&path, b"\x89PNG").await.unwrap();
            paths.push(path);
        }
        paths
    }

    #[test]
    fn routes_on_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let (policy, _) = policy(&config(dir.path()));
        assert_eq!(policy.mode_for(1), ProcessingMode::Sync);
        assert_eq!(policy.mode_for(5), ProcessingMode::Sync);
        assert_eq!(policy.mode_for(6), ProcessingMode::Batch);
    }

    #[tokio::test]
    async fn empty_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (policy, _) = policy(&config(dir.path()));
        let err = policy.process_dir(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, NameplateError::NoImages(_)));
    }

    #[tokio::test]
    async fn five_images_run_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        write_images(&config.paths.input_dir, 5).await;
        let (policy, registry) = policy(&config);

        let summary = policy.process_dir(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary.mode, ProcessingMode::Sync);
        assert_eq!(summary.success, 5);
        assert_eq!(registry.stats().await.total_jobs, 0);
        assert_eq!(policy.output().list_record_files().await.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn six_images_go_to_a_bulk_job() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        write_images(&config.paths.input_dir, 6).await;
        let (policy, registry) = policy(&config);

        let summary = policy.process_dir(&CancellationToken::new()).await.unwrap();
        assert_eq!(summary.mode, ProcessingMode::Batch);
        assert_eq!(summary.success, 6);
        assert!(summary.job_id.is_some());
        assert_eq!(registry.stats().await.status_breakdown["completed"], 1);
        assert_eq!(policy.output().list_record_files().await.len(), 6);

        let mut reports = tokio::fs::read_dir(config.paths.reports_dir()).await.unwrap();
        let entry = reports.next_entry().await.unwrap().unwrap();
        assert!(entry.file_name().to_string_lossy().starts_with("resumo_"));
    }

    #[tokio::test]
    async fn single_image_is_saved_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let images = write_images(&config.paths.input_dir, 1).await;
        let (policy, _) = policy(&config);

        let (record, saved) = policy.process_single(&images[0]).await.unwrap();
        assert!(record.is_sealed());
        assert_eq!(saved, Some(config.paths.json_dir().join("placa_00_ocr.json")));
    }
}
