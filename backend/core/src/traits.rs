use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::job::{BulkItemResult, JobStatus};

/// Raw, unnormalized key/value pairs as read off a plate.
pub type RawFields = Map<String, Value>;

/// An image ready to be sent to a backend.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// File name, used for logging and record metadata.
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImageInput {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

/// Reads key/value text off a single nameplate image.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Backend name (e.g., "mistral", "mock").
    fn name(&self) -> &str;

    /// Transcribe one image. Failure is a per-image error.
    async fn recognize(&self, image: &ImageInput) -> Result<RawFields>;
}

/// Asynchronous bulk transcription offered at a discount for large volumes.
#[async_trait]
pub trait BulkJobBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Submit all images as one job and return its identifier.
    async fn submit(&self, images: &[ImageInput]) -> Result<String>;

    /// Current state of a submitted job.
    async fn poll(&self, job_id: &str) -> Result<JobStatus>;

    /// Per-image raw results of a completed job.
    async fn fetch_results(&self, job_id: &str) -> Result<Vec<BulkItemResult>>;
}
