//! Bulk job bookkeeping shared by the deferred path and its registry.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle state reported by a bulk backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Created,
    Running,
    Completed,
    Failed,
    NotFound,
    /// Anything the backend reports that we do not recognize.
    Other(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::NotFound => "not_found",
            Self::Other(s) => s.as_str(),
        }
    }

    /// Completed and failed are the only states a job never leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "created" => Self::Created,
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "not_found" => Self::NotFound,
            _ => Self::Other(s),
        }
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deferred processing unit covering many images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkJob {
    pub job_id: String,
    pub status: JobStatus,
    pub total_images: usize,
    #[serde(default)]
    pub processed: usize,
    /// Source file names, in submission order.
    #[serde(default)]
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl BulkJob {
    pub fn new(job_id: impl Into<String>, images: Vec<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Created,
            total_images: images.len(),
            processed: 0,
            images,
            created_at: Utc::now(),
            updated_at: None,
            errors: Vec::new(),
        }
    }

    pub fn update_status(&mut self, status: JobStatus) {
        self.status = status;
        self.updated_at = Some(Utc::now());
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.updated_at = Some(Utc::now());
    }
}

/// One image's raw output as returned by a completed bulk job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemResult {
    /// Position of the image in the submitted list.
    pub image_index: usize,
    pub success: bool,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub error: Option<String>,
}
