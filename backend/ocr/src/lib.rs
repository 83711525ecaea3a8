//! OCR backends: Mistral vision chat for single images, the Mistral batch API
//! for bulk jobs, and deterministic mocks of both.

pub mod batch;
pub mod mock;
pub mod prompt;
pub mod vision;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use nameplate_config::NameplateConfig;
use nameplate_core::{BulkJobBackend, OcrBackend};

pub use batch::MistralBatchBackend;
pub use mock::{MockBulkBackend, MockOcrBackend};
pub use prompt::{parse_fields, ChatSettings, EXTRACTION_PROMPT};
pub use vision::MistralVisionBackend;

/// The pair of backends a processing run talks to.
#[derive(Clone)]
pub struct Backends {
    pub ocr: Arc<dyn OcrBackend>,
    pub bulk: Arc<dyn BulkJobBackend>,
}

impl Backends {
    /// Real HTTP backends, or the mocks when `processing.use_mock_backend` is set.
    pub fn from_config(config: &NameplateConfig) -> Result<Self> {
        let backends = if config.processing.use_mock_backend {
            Self::mock()
        } else {
            Self {
                ocr: Arc::new(MistralVisionBackend::from_config(&config.api)?),
                bulk: Arc::new(MistralBatchBackend::from_config(&config.api)?),
            }
        };
        info!(ocr = backends.ocr.name(), bulk = backends.bulk.name(), "OCR backends ready");
        Ok(backends)
    }

    pub fn mock() -> Self {
        Self {
            ocr: Arc::new(MockOcrBackend::new()),
            bulk: Arc::new(MockBulkBackend::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_flag_selects_mocks() {
        let mut config = NameplateConfig::default();
        config.processing.use_mock_backend = true;
        let backends = Backends::from_config(&config).unwrap();
        assert_eq!(backends.ocr.name(), "mock");
        assert_eq!(backends.bulk.name(), "mock-batch");
    }

    #[test]
    fn real_backends_need_a_key() {
        assert!(Backends::from_config(&NameplateConfig::default()).is_err());
    }
}
