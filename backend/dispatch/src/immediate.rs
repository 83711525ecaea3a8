//! Immediate path: one OCR call per image, in order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use nameplate_core::{
    CanonicalField, NameplateError, NameplateRecord, OcrBackend, ProcessingMode,
    ProcessingSummary, RecordSource,
};
use nameplate_normalizer::FieldNormalizer;

use crate::images::{display_name, load_image};

pub struct ImmediatePath {
    ocr: Arc<dyn OcrBackend>,
    normalizer: Arc<FieldNormalizer>,
    required: Vec<CanonicalField>,
}

impl ImmediatePath {
    pub fn new(
        ocr: Arc<dyn OcrBackend>,
        normalizer: Arc<FieldNormalizer>,
        required: Vec<CanonicalField>,
    ) -> Self {
        Self {
            ocr,
            normalizer,
            required,
        }
    }

    /// Read, recognize, normalize and seal one image.
    pub async fn process_one(&self, path: &Path) -> Result<NameplateRecord, NameplateError> {
        let start = Instant::now();
        let image = load_image(path).await?;
        let raw = self
            .ocr
            .recognize(&image)
            .await
            .map_err(|e| NameplateError::Ocr {
                image: image.name.clone(),
                message: format!("{e:#}"),
            })?;

        let record = self.normalizer.normalize(&raw);
        let source = RecordSource::new(image.name, ProcessingMode::Sync)
            .with_processing_time_ms(start.elapsed().as_millis() as u64);
        Ok(record.seal(source, &self.required))
    }

    /// Process every image; failures are recorded and never stop the loop.
    pub async fn run(&self, images: &[PathBuf]) -> ProcessingSummary {
        let mut summary = ProcessingSummary::start(ProcessingMode::Sync, images.len());
        for (i, path) in images.iter().enumerate() {
            let name = display_name(path);
            info!(image = %name, position = i + 1, total = images.len(), "Processing image");
            match self.process_one(path).await {
                Ok(record) => summary.record_success(record),
                Err(e) => {
                    error!(image = %name, error = %e, "Image failed");
                    summary.record_failure(name, e.to_string());
                }
            }
        }
        summary.finish();
        info!(
            success = summary.success,
            errors = summary.errors,
            success_rate = summary.success_rate,
            "Immediate processing finished"
        );
        summary
    }
}
