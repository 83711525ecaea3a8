//! Deterministic backends for offline runs and tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use nameplate_core::{BulkItemResult, BulkJobBackend, ImageInput, JobStatus, OcrBackend, RawFields};

fn object(value: Value) -> RawFields {
    match value {
        Value::Object(map) => map,
        _ => RawFields::new(),
    }
}

fn prefix(name: &str, len: usize) -> String {
    name.chars().take(len).collect()
}

/// An OCR backend that returns canned plate fields.
#[derive(Default)]
pub struct MockOcrBackend {
    responses: HashMap<String, RawFields>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl MockOcrBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `fields` for the image named `image`.
    pub fn with_response(mut self, image: impl Into<String>, fields: RawFields) -> Self {
        self.responses.insert(image.into(), fields);
        self
    }

    /// Fail recognition for the image named `image`.
    pub fn failing_on(mut self, image: impl Into<String>) -> Self {
        self.failing.insert(image.into());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fields a typical plate yields, labelled the way OCR tends to print them.
    pub fn canned_fields(image_name: &str) -> RawFields {
        object(json!({
            "Manufacturer": "ACME Corporation",
            "Serial Number": format!("SN-{}", prefix(image_name, 8)),
            "PMTA": "14,5 kgf/cm²",
            "Category": "I",
            "Year": "2020",
            "Tag": format!("TAG-{}", prefix(image_name, 5)),
            "Material": "Carbon Steel",
            "Diameter": "1200 mm",
        }))
    }
}

#[async_trait]
impl OcrBackend for MockOcrBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn recognize(&self, image: &ImageInput) -> Result<RawFields> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&image.name) {
            bail!("mock OCR failure for {}", image.name);
        }
        Ok(self
            .responses
            .get(&image.name)
            .cloned()
            .unwrap_or_else(|| Self::canned_fields(&image.name)))
    }
}

struct MockJob {
    images: Vec<String>,
    polls: usize,
}

/// A bulk backend whose jobs report `running` for a fixed number of polls and
/// then settle on a final status.
pub struct MockBulkBackend {
    polls_until_done: usize,
    final_status: JobStatus,
    reject_submit: bool,
    failing_items: HashSet<usize>,
    omitted_items: HashSet<usize>,
    jobs: Mutex<HashMap<String, MockJob>>,
    submitted: AtomicUsize,
}

impl Default for MockBulkBackend {
    fn default() -> Self {
        Self {
            polls_until_done: 1,
            final_status: JobStatus::Completed,
            reject_submit: false,
            failing_items: HashSet::new(),
            omitted_items: HashSet::new(),
            jobs: Mutex::new(HashMap::new()),
            submitted: AtomicUsize::new(0),
        }
    }
}

impl MockBulkBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `running` for the first `polls` status checks.
    pub fn completing_after(mut self, polls: usize) -> Self {
        self.polls_until_done = polls;
        self
    }

    /// Status reported once the job stops running.
    pub fn ending_with(mut self, status: JobStatus) -> Self {
        self.final_status = status;
        self
    }

    /// Jobs never leave `running`.
    pub fn never_completing(mut self) -> Self {
        self.polls_until_done = usize::MAX;
        self
    }

    pub fn rejecting_submissions(mut self) -> Self {
        self.reject_submit = true;
        self
    }

    /// Item at `index` comes back unsuccessful.
    pub fn failing_item(mut self, index: usize) -> Self {
        self.failing_items.insert(index);
        self
    }

    /// Item at `index` is missing from the results.
    pub fn omitting_item(mut self, index: usize) -> Self {
        self.omitted_items.insert(index);
        self
    }

    /// Number of jobs submitted so far.
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    fn item_fields(job_id: &str, index: usize) -> RawFields {
        let suffix: String = {
            let chars: Vec<char> = job_id.chars().collect();
            chars[chars.len().saturating_sub(8)..].iter().collect()
        };
        object(json!({
            "fabricante": format!("Fabricante {}", index + 1),
            "numero_serie": format!("SN-{}-{:03}", suffix, index),
            "categoria": "I",
            "pressao_maxima_trabalho": "14.5 kgf/cm²",
            "ano_fabricacao": "2020",
            "identificacao": format!("TAG-{:03}", index + 1),
        }))
    }
}

#[async_trait]
impl BulkJobBackend for MockBulkBackend {
    fn name(&self) -> &str {
        "mock-batch"
    }

    async fn submit(&self, images: &[ImageInput]) -> Result<String> {
        if self.reject_submit {
            bail!("mock bulk backend rejected the submission");
        }
        let seq = self.submitted.fetch_add(1, Ordering::SeqCst) + 1;
        let job_id = format!("batch_{}_{}_{}", chrono::Utc::now().timestamp(), images.len(), seq);
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        jobs.insert(
            job_id.clone(),
            MockJob {
                images: images.iter().map(|i| i.name.clone()).collect(),
                polls: 0,
            },
        );
        Ok(job_id)
    }

    async fn poll(&self, job_id: &str) -> Result<JobStatus> {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        let Some(job) = jobs.get_mut(job_id) else {
            return Ok(JobStatus::NotFound);
        };
        job.polls += 1;
        if job.polls > self.polls_until_done {
            Ok(self.final_status.clone())
        } else {
            Ok(JobStatus::Running)
        }
    }

    async fn fetch_results(&self, job_id: &str) -> Result<Vec<BulkItemResult>> {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        let Some(job) = jobs.get(job_id) else {
            bail!("unknown mock job {job_id}");
        };
        Ok((0..job.images.len())
            .filter(|i| !self.omitted_items.contains(i))
            .map(|i| {
                if self.failing_items.contains(&i) {
                    BulkItemResult {
                        image_index: i,
                        success: false,
                        data: None,
                        error: Some(format!("mock failure for {}", job.images[i])),
                    }
                } else {
                    BulkItemResult {
                        image_index: i,
                        success: true,
                        data: Some(Self::item_fields(job_id, i)),
                        error: None,
                    }
                }
            })
            .collect())
    }
}
