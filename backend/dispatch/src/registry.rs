//! Bulk job history, mirrored to `batch/batch_jobs.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use nameplate_core::{BulkJob, JobStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobStats {
    pub total_jobs: usize,
    pub status_breakdown: BTreeMap<String, usize>,
    /// Images across completed jobs.
    pub total_images_processed: usize,
}

pub struct JobRegistry {
    path: Option<PathBuf>,
    jobs: Mutex<BTreeMap<String, BulkJob>>,
}

impl JobRegistry {
    /// Open the registry file. A missing or malformed file starts empty.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let jobs = read_jobs(&path).await;
        info!(path = %path.display(), jobs = jobs.len(), "Job registry opened");
        Self {
            path: Some(path),
            jobs: Mutex::new(jobs),
        }
    }

    /// A registry that never touches disk (for testing).
    pub fn in_memory() -> Self {
        Self {
            path: None,
            jobs: Mutex::new(BTreeMap::new()),
        }
    }

    /// Add or replace a job and persist.
    pub async fn insert(&self, job: BulkJob) -> bool {
        let mut jobs = self.jobs.lock().await;
        jobs.insert(job.job_id.clone(), job);
        self.persist(&jobs).await
    }

    /// Apply `change` to a known job and persist. Unknown ids are ignored.
    pub async fn update<F>(&self, job_id: &str, change: F) -> bool
    where
        F: FnOnce(&mut BulkJob),
    {
        let mut jobs = self.jobs.lock().await;
        let Some(job) = jobs.get_mut(job_id) else {
            warn!(job_id, "Update for unknown job ignored");
            return false;
        };
        change(job);
        self.persist(&jobs).await
    }

    pub async fn set_status(&self, job_id: &str, status: JobStatus) -> bool {
        self.update(job_id, |job| job.update_status(status)).await
    }

    pub async fn get(&self, job_id: &str) -> Option<BulkJob> {
        self.jobs.lock().await.get(job_id).cloned()
    }

    /// Jobs newest first, at most `limit` of them (`0` means all).
    pub async fn list_jobs(&self, limit: usize) -> Vec<BulkJob> {
        let mut jobs: Vec<BulkJob> = self.jobs.lock().await.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if limit > 0 {
            jobs.truncate(limit);
        }
        jobs
    }

    pub async fn stats(&self) -> JobStats {
        let jobs = self.jobs.lock().await;
        let mut stats = JobStats {
            total_jobs: jobs.len(),
            ..JobStats::default()
        };
        for job in jobs.values() {
            *stats
                .status_breakdown
                .entry(job.status.as_str().to_string())
                .or_default() += 1;
            if job.status == JobStatus::Completed {
                stats.total_images_processed += job.total_images;
            }
        }
        stats
    }

    async fn persist(&self, jobs: &BTreeMap<String, BulkJob>) -> bool {
        let Some(path) = &self.path else {
            return true;
        };
        match write_jobs(path, jobs).await {
            Ok(()) => {
                debug!(path = %path.display(), jobs = jobs.len(), "Job registry saved");
                true
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to save job registry");
                false
            }
        }
    }
}

async fn read_jobs(path: &Path) -> BTreeMap<String, BulkJob> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to read job registry");
            return BTreeMap::new();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        error!(path = %path.display(), error = %e, "Malformed job registry; starting empty");
        BTreeMap::new()
    })
}

/// Write to a sibling temp file, then rename over the target.
async fn write_jobs(path: &Path, jobs: &BTreeMap<String, BulkJob>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let body = serde_json::to_string_pretty(jobs)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}
