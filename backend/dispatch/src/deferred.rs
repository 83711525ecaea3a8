//! Deferred path: images go out in bulk jobs that are polled until they
//! finish, then every returned item is normalized.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use nameplate_config::ProcessingConfig;
use nameplate_core::{
    BulkJob, BulkJobBackend, CanonicalField, ImageInput, JobStatus, NameplateError,
    ProcessingMode, ProcessingSummary, RecordSource,
};
use nameplate_normalizer::FieldNormalizer;

use crate::images::{display_name, load_image};
use crate::registry::JobRegistry;

/// Chunking and polling knobs.
#[derive(Debug, Clone)]
pub struct DeferredSettings {
    pub max_bulk_size: usize,
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl From<&ProcessingConfig> for DeferredSettings {
    fn from(p: &ProcessingConfig) -> Self {
        Self {
            max_bulk_size: p.max_bulk_size.max(1),
            poll_interval: Duration::from_secs(p.poll_interval_secs),
            max_wait: Duration::from_secs(p.max_wait_secs),
        }
    }
}

pub struct DeferredPath {
    bulk: Arc<dyn BulkJobBackend>,
    normalizer: Arc<FieldNormalizer>,
    registry: Arc<JobRegistry>,
    required: Vec<CanonicalField>,
    settings: DeferredSettings,
}

impl DeferredPath {
    pub fn new(
        bulk: Arc<dyn BulkJobBackend>,
        normalizer: Arc<FieldNormalizer>,
        registry: Arc<JobRegistry>,
        required: Vec<CanonicalField>,
        settings: DeferredSettings,
    ) -> Self {
        Self {
            bulk,
            normalizer,
            registry,
            required,
            settings,
        }
    }

    /// Run every chunk to completion. The first chunk that fails fails the
    /// whole run and no summary is produced.
    pub async fn run(
        &self,
        images: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Result<ProcessingSummary, NameplateError> {
        let mut summary = ProcessingSummary::start(ProcessingMode::Batch, images.len());
        let mut job_ids = Vec::new();

        let chunks = images.chunks(self.settings.max_bulk_size);
        let chunk_count = chunks.len();
        for (n, chunk) in chunks.enumerate() {
            info!(chunk = n + 1, of = chunk_count, images = chunk.len(), "Starting bulk chunk");
            if let Some(job_id) = self.run_chunk(chunk, cancel, &mut summary).await? {
                job_ids.push(job_id);
            }
        }

        if !job_ids.is_empty() {
            summary.job_id = Some(job_ids.join(","));
        }
        summary.finish();
        info!(
            jobs = job_ids.len(),
            success = summary.success,
            errors = summary.errors,
            success_rate = summary.success_rate,
            "Deferred processing finished"
        );
        Ok(summary)
    }

    async fn run_chunk(
        &self,
        chunk: &[PathBuf],
        cancel: &CancellationToken,
        summary: &mut ProcessingSummary,
    ) -> Result<Option<String>, NameplateError> {
        let mut inputs: Vec<ImageInput> = Vec::with_capacity(chunk.len());
        for path in chunk {
            match load_image(path).await {
                Ok(image) => inputs.push(image),
                Err(e) if e.is_per_image() => {
                    error!(image = %display_name(path), error = %e, "Image failed");
                    summary.record_failure(display_name(path), e.to_string());
                }
                Err(e) => return Err(e),
            }
        }
        if inputs.is_empty() {
            warn!("No readable images in chunk; nothing submitted");
            return Ok(None);
        }
        let names: Vec<String> = inputs.iter().map(|i| i.name.clone()).collect();

        let job_id = self
            .bulk
            .submit(&inputs)
            .await
            .map_err(|e| NameplateError::Submission(format!("{e:#}")))?;
        drop(inputs);

        self.registry
            .insert(BulkJob::new(job_id.clone(), names.clone()))
            .await;
        info!(job_id = %job_id, images = names.len(), backend = self.bulk.name(), "Bulk job submitted");

        if let Err(e) = self.wait_for_completion(&job_id, cancel).await {
            let status = match &e {
                NameplateError::JobFailed { status, .. } => JobStatus::from(status.clone()),
                _ => JobStatus::Failed,
            };
            let reason = e.to_string();
            self.registry
                .update(&job_id, |job| {
                    job.add_error(reason);
                    job.update_status(status);
                })
                .await;
            return Err(e);
        }

        let results = match self.bulk.fetch_results(&job_id).await {
            Ok(results) => results,
            Err(e) => {
                let reason = format!("fetching results failed: {e:#}");
                self.registry
                    .update(&job_id, |job| job.add_error(reason.clone()))
                    .await;
                return Err(NameplateError::Other(e.context(format!(
                    "Failed to fetch results of bulk job {job_id}"
                ))));
            }
        };

        let mut seen = HashSet::new();
        let mut job_errors = Vec::new();
        let mut processed = 0;
        for item in results {
            let Some(name) = names.get(item.image_index) else {
                warn!(job_id = %job_id, index = item.image_index, "Result for unknown image index ignored");
                continue;
            };
            if !seen.insert(item.image_index) {
                warn!(job_id = %job_id, index = item.image_index, "Duplicate result ignored");
                continue;
            }
            match item.data.filter(|_| item.success) {
                Some(raw) => {
                    let record = self.normalizer.normalize(&raw);
                    let source = RecordSource::new(name.clone(), ProcessingMode::Batch)
                        .with_job_id(job_id.clone());
                    summary.record_success(record.seal(source, &self.required));
                    processed += 1;
                }
                None => {
                    let reason = item.error.unwrap_or_else(|| "unsuccessful result".to_string());
                    job_errors.push(format!("{name}: {reason}"));
                    summary.record_failure(name.clone(), reason);
                }
            }
        }
        for (index, name) in names.iter().enumerate() {
            if !seen.contains(&index) {
                job_errors.push(format!("{name}: no result returned"));
                summary.record_failure(name.clone(), "no result returned");
            }
        }

        self.registry
            .update(&job_id, |job| {
                job.processed = processed;
                for err in job_errors {
                    job.add_error(err);
                }
                job.update_status(JobStatus::Completed);
            })
            .await;
        Ok(Some(job_id))
    }

    /// Poll until the job completes, fails, the wait budget runs out or the
    /// caller cancels. The remote job is left alone on timeout and cancel.
    /// Non-terminal status changes are mirrored into the registry.
    pub async fn wait_for_completion(
        &self,
        job_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), NameplateError> {
        let started = Instant::now();
        let mut last_seen: Option<JobStatus> = None;
        while started.elapsed() < self.settings.max_wait {
            if cancel.is_cancelled() {
                return Err(NameplateError::Cancelled {
                    job_id: job_id.to_string(),
                });
            }

            match self.bulk.poll(job_id).await {
                Ok(JobStatus::Completed) => {
                    info!(job_id, "Bulk job completed");
                    return Ok(());
                }
                Ok(status @ (JobStatus::Failed | JobStatus::NotFound)) => {
                    error!(job_id, %status, "Bulk job did not complete");
                    return Err(NameplateError::JobFailed {
                        job_id: job_id.to_string(),
                        status: status.to_string(),
                    });
                }
                Ok(status) => {
                    if let JobStatus::Other(raw) = &status {
                        warn!(job_id, status = %raw, "Unknown bulk job status; still waiting");
                    } else {
                        info!(job_id, %status, wait_secs = self.settings.poll_interval.as_secs(), "Bulk job still processing");
                    }
                    if last_seen.as_ref() != Some(&status) {
                        self.registry.set_status(job_id, status.clone()).await;
                        last_seen = Some(status);
                    }
                }
                Err(e) => {
                    warn!(job_id, error = %e, "Bulk job status check failed; still waiting");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(job_id, "Wait for bulk job cancelled");
                    return Err(NameplateError::Cancelled { job_id: job_id.to_string() });
                }
                _ = tokio::time::sleep(self.settings.poll_interval) => {}
            }
        }

        error!(job_id, waited_secs = self.settings.max_wait.as_secs(), "Timed out waiting for bulk job");
        Err(NameplateError::JobTimeout {
            job_id: job_id.to_string(),
            waited_secs: started.elapsed().as_secs(),
        })
    }
}
