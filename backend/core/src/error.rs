use thiserror::Error;

/// Top-level error type for nameplate processing.
#[derive(Debug, Error)]
pub enum NameplateError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("no images found in {0}")]
    NoImages(String),

    #[error("failed to read image {image}: {message}")]
    Image { image: String, message: String },

    #[error("OCR backend error ({image}): {message}")]
    Ocr { image: String, message: String },

    #[error("bulk job submission failed: {0}")]
    Submission(String),

    #[error("bulk job {job_id} ended with status {status}")]
    JobFailed { job_id: String, status: String },

    #[error("bulk job {job_id} did not finish within {waited_secs}s")]
    JobTimeout { job_id: String, waited_secs: u64 },

    #[error("wait for bulk job {job_id} was cancelled")]
    Cancelled { job_id: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl NameplateError {
    /// Whether this error belongs to a single image and should only be counted
    /// as a failure instead of aborting the invocation.
    pub fn is_per_image(&self) -> bool {
        matches!(self, Self::Image { .. } | Self::Ocr { .. })
    }
}
