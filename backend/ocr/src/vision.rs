use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use nameplate_config::ApiConfig;
use nameplate_core::{ImageInput, OcrBackend, RawFields};

use crate::prompt::{chat_request_body, completion_text, parse_fields, ChatSettings};

/// Per-image OCR through Mistral's vision chat completions.
pub struct MistralVisionBackend {
    client: Client,
    api_key: String,
    base_url: String,
    settings: ChatSettings,
}

impl MistralVisionBackend {
    pub fn new(api_key: impl Into<String>, settings: ChatSettings) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: nameplate_config::defaults::DEFAULT_BASE_URL.to_string(),
            settings,
        }
    }

    pub fn from_config(api: &ApiConfig) -> Result<Self> {
        let api_key = api
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .context("Mistral API key is not configured")?;
        let client = Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            settings: ChatSettings::from(api),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl OcrBackend for MistralVisionBackend {
    fn name(&self) -> &str {
        "mistral"
    }

    async fn recognize(&self, image: &ImageInput) -> Result<RawFields> {
        let start = Instant::now();
        let body = chat_request_body(&self.settings, image);

        debug!(model = %self.settings.model, image = %image.name, bytes = image.bytes.len(), "Sending OCR request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Mistral HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Mistral returned {}: {}", status, error_body);
        }

        let json: Value = response
            .json()
            .await
            .context("Failed to parse Mistral response")?;
        let fields = parse_fields(completion_text(&json)?)?;

        info!(
            image = %image.name,
            fields = fields.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "OCR completed"
        );
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_requires_key() {
        assert!(MistralVisionBackend::from_config(&ApiConfig::default()).is_err());

        let mut api = ApiConfig::default();
        api.api_key = Some("sk-test".into());
        api.base_url = "https://example.test/v1/".into();
        let backend = MistralVisionBackend::from_config(&api).unwrap();
        assert_eq!(backend.base_url, "https://example.test/v1");
        assert_eq!(backend.name(), "mistral");
    }
}
