//! Mistral batch API: upload a JSONL file of chat requests, create a job,
//! poll it, then download the output file.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use nameplate_config::ApiConfig;
use nameplate_core::{BulkItemResult, BulkJobBackend, ImageInput, JobStatus};

use crate::prompt::{chat_request_body, completion_text, parse_fields, ChatSettings};

const CHAT_ENDPOINT: &str = "/v1/chat/completions";

pub struct MistralBatchBackend {
    client: Client,
    api_key: String,
    base_url: String,
    settings: ChatSettings,
}

#[derive(Deserialize)]
struct UploadedFile {
    id: String,
}

#[derive(Deserialize)]
struct BatchJobResponse {
    id: String,
    status: String,
    #[serde(default)]
    output_file: Option<String>,
}

impl MistralBatchBackend {
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

    async fn upload_input(&self, images: &[ImageInput]) -> Result<String> {
        let jsonl = build_input_file(&self.settings, images)?;
        let part = Part::bytes(jsonl.into_bytes())
            .file_name("nameplates.jsonl")
            .mime_str("application/jsonl")
            .context("Invalid MIME type for batch input")?;
        let form = Form::new().text("purpose", "batch").part("file", part);

        let response = self
            .client
            .post(format!("{}/files", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Batch input upload failed")?;
        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            bail!("Mistral file upload returned {}: {}", status, error_body);
        }
        let file: UploadedFile = response
            .json()
            .await
            .context("Failed to parse file upload response")?;
        Ok(file.id)
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<BatchJobResponse>> {
        let response = self
            .client
            .get(format!("{}/batch/jobs/{}", self.base_url, job_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Batch job status request failed")?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            bail!("Mistral batch status returned {}: {}", status, error_body);
        }
        let job = response
            .json()
            .await
            .context("Failed to parse batch job response")?;
        Ok(Some(job))
    }
}

/// One JSONL line per image; `custom_id` carries the image index.
fn build_input_file(settings: &ChatSettings, images: &[ImageInput]) -> Result<String> {
    let mut out = String::new();
    for (index, image) in images.iter().enumerate() {
        let mut body = chat_request_body(settings, image);
        if let Some(obj) = body.as_object_mut() {
            obj.remove("model");
        }
        let line = json!({ "custom_id": index.to_string(), "body": body });
        out.push_str(&serde_json::to_string(&line).context("Failed to encode batch line")?);
        out.push('\n');
    }
    Ok(out)
}

/// Map the API's upper-case job states onto [`JobStatus`].
fn map_status(status: &str) -> JobStatus {
    match status {
        "QUEUED" => JobStatus::Created,
        "RUNNING" => JobStatus::Running,
        "SUCCESS" => JobStatus::Completed,
        "FAILED" | "TIMEOUT_EXCEEDED" | "CANCELLED" => JobStatus::Failed,
        other => JobStatus::Other(other.to_lowercase()),
    }
}

/// Parse the downloaded output file into per-image results.
fn parse_output_file(content: &str) -> Vec<BulkItemResult> {
    let mut results = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let entry: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "Skipping unparseable batch output line");
                continue;
            }
        };
        let Some(image_index) = entry["custom_id"]
            .as_str()
            .and_then(|id| id.parse::<usize>().ok())
        else {
            warn!(line = line_no + 1, "Batch output line has no usable custom_id");
            continue;
        };

        let status_code = entry["response"]["status_code"].as_u64().unwrap_or(0);
        let parsed = if status_code == 200 {
            completion_text(&entry["response"]["body"]).and_then(parse_fields)
        } else if let Some(message) = entry["error"]["message"].as_str() {
            Err(anyhow::anyhow!(message.to_string()))
        } else {
            Err(anyhow::anyhow!("request returned status {status_code}"))
        };

        results.push(match parsed {
            Ok(fields) => BulkItemResult {
                image_index,
                success: true,
                data: Some(fields),
                error: None,
            },
            Err(e) => BulkItemResult {
                image_index,
                success: false,
                data: None,
                error: Some(e.to_string()),
            },
        });
    }
    results
}

#[async_trait]
impl BulkJobBackend for MistralBatchBackend {
    fn name(&self) -> &str {
        "mistral-batch"
    }

    async fn submit(&self, images: &[ImageInput]) -> Result<String> {
        let file_id = self.upload_input(images).await?;
        let body = json!({
            "input_files": [file_id],
            "model": self.settings.model,
            "endpoint": CHAT_ENDPOINT,
            "metadata": { "images": images.len().to_string() },
        });

        let response = self
            .client
            .post(format!("{}/batch/jobs", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Batch job creation failed")?;
        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            bail!("Mistral batch job creation returned {}: {}", status, error_body);
        }
        let job: BatchJobResponse = response
            .json()
            .await
            .context("Failed to parse batch job response")?;

        info!(job_id = %job.id, images = images.len(), status = %job.status, "Batch job created");
        Ok(job.id)
    }

    async fn poll(&self, job_id: &str) -> Result<JobStatus> {
        Ok(match self.get_job(job_id).await? {
            Some(job) => {
                debug!(job_id, status = %job.status, "Polled batch job");
                map_status(&job.status)
            }
            None => JobStatus::NotFound,
        })
    }

    async fn fetch_results(&self, job_id: &str) -> Result<Vec<BulkItemResult>> {
        let job = self
            .get_job(job_id)
            .await?
            .with_context(|| format!("Batch job {job_id} not found"))?;
        let output_file = job
            .output_file
            .with_context(|| format!("Batch job {job_id} has no output file"))?;

        let response = self
            .client
            .get(format!("{}/files/{}/content", self.base_url, output_file))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .context("Batch output download failed")?;
        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            bail!("Mistral output download returned {}: {}", status, error_body);
        }
        let content = response
            .text()
            .await
            .context("Failed to read batch output")?;

        let results = parse_output_file(&content);
        info!(job_id, results = results.len(), "Fetched batch results");
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_file_has_one_line_per_image() {
        let settings = ChatSettings::from(&ApiConfig::default());
        let images = vec![
            ImageInput::new("a.jpg", "image/jpeg", vec![0]),
            ImageInput::new("b.jpg", "image/jpeg", vec![1]),
        ];
        let jsonl = build_input_file(&settings, &images).unwrap();
        let lines: Vec<Value> = jsonl.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["custom_id"], "1");
        assert!(lines[0]["body"].get("model").is_none());
        assert_eq!(lines[0]["body"]["max_tokens"], 2000);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(map_status("QUEUED"), JobStatus::Created);
        assert_eq!(map_status("SUCCESS"), JobStatus::Completed);
        assert_eq!(map_status("TIMEOUT_EXCEEDED"), JobStatus::Failed);
        assert_eq!(
            map_status("CANCELLATION_REQUESTED"),
            JobStatus::Other("cancellation_requested".into())
        );
    }

    #[test]
    fn output_file_parsing() {
        let ok = json!({
            "custom_id": "0",
            "response": {
                "status_code": 200,
                "body": {"choices": [{"message": {"content": "{\"PMTA\": \"10 bar\"}"}}]}
            }
        });
        let failed = json!({
            "custom_id": "2",
            "response": {"status_code": 500, "body": {}},
            "error": {"message": "model overloaded"}
        });
        let content = format!("{ok}\n\nnot json\n{failed}\n");

        let results = parse_output_file(&content);
        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert_eq!(results[0].data.as_ref().unwrap()["PMTA"], "10 bar");
        assert_eq!(results[1].image_index, 2);
        assert!(!results[1].success);
        assert_eq!(results[1].error.as_deref(), Some("model overloaded"));
    }
}
