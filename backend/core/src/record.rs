//! Normalized nameplate records and their metadata block.
//!
//! On disk a record is one flat JSON object: canonical fields at the top
//! level, unmatched keys under `other_fields`, and `_`-prefixed keys for
//! metadata.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::CanonicalField;
use crate::validation::{validate, ValidationResult};

/// Prefix marking keys that are metadata rather than plate content.
pub const METADATA_PREFIX: char = '_';

/// Key holding the sealed [`RecordMetadata`].
pub const METADATA_KEY: &str = "_metadata";

/// Key holding raw keys that did not resolve to a canonical field.
pub const OTHER_FIELDS_KEY: &str = "other_fields";

/// Which processing path produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Immediate, one image per OCR call.
    Sync,
    /// Deferred, many images per bulk job.
    Batch,
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync => f.write_str("sync"),
            Self::Batch => f.write_str("batch"),
        }
    }
}

/// Where a record came from, supplied when sealing it.
#[derive(Debug, Clone)]
pub struct RecordSource {
    pub source_file: String,
    pub mode: ProcessingMode,
    pub job_id: Option<String>,
    pub processing_time_ms: Option<u64>,
}

impl RecordSource {
    pub fn new(source_file: impl Into<String>, mode: ProcessingMode) -> Self {
        Self {
            source_file: source_file.into(),
            mode,
            job_id: None,
            processing_time_ms: None,
        }
    }

    pub fn with_job_id(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn with_processing_time_ms(mut self, ms: u64) -> Self {
        self.processing_time_ms = Some(ms);
        self
    }
}

/// Metadata attached to a record once it has been validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub source_file: String,
    pub processed_at: DateTime<Utc>,
    pub mode: ProcessingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    pub validation: ValidationResult,
}

/// A normalized nameplate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct NameplateRecord {
    fields: BTreeMap<CanonicalField, String>,
    other_fields: BTreeMap<String, Value>,
    passthrough: BTreeMap<String, Value>,
    metadata: Option<RecordMetadata>,
}

impl NameplateRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<CanonicalField, String> {
        &self.fields
    }

    pub fn other_fields(&self) -> &BTreeMap<String, Value> {
        &self.other_fields
    }

    pub fn passthrough(&self) -> &BTreeMap<String, Value> {
        &self.passthrough
    }

    pub fn metadata(&self) -> Option<&RecordMetadata> {
        self.metadata.as_ref()
    }

    pub fn validation(&self) -> Option<&ValidationResult> {
        self.metadata.as_ref().map(|m| &m.validation)
    }

    pub fn is_sealed(&self) -> bool {
        self.metadata.is_some()
    }

    /// Set a canonical field. Sealed records are left untouched.
    pub fn insert(&mut self, field: CanonicalField, value: impl Into<String>) -> bool {
        if self.is_sealed() {
            return false;
        }
        self.fields.insert(field, value.into());
        true
    }

    pub fn insert_other(&mut self, key: impl Into<String>, value: Value) -> bool {
        if self.is_sealed() {
            return false;
        }
        self.other_fields.insert(key.into(), value);
        true
    }

    pub fn insert_passthrough(&mut self, key: impl Into<String>, value: Value) -> bool {
        if self.is_sealed() {
            return false;
        }
        self.passthrough.insert(key.into(), value);
        true
    }

    /// Validate against `required` and attach metadata. After this the record
    /// no longer accepts field changes.
    pub fn seal(mut self, source: RecordSource, required: &[CanonicalField]) -> Self {
        let validation = validate(&self, required);
        self.metadata = Some(RecordMetadata {
            source_file: source.source_file,
            processed_at: Utc::now(),
            mode: source.mode,
            job_id: source.job_id,
            processing_time_ms: source.processing_time_ms,
            validation,
        });
        self
    }

    /// Canonical fields and pass-through keys as a raw key/value map, suitable
    /// for feeding back into the normalizer.
    pub fn to_raw(&self) -> Map<String, Value> {
        let mut raw = Map::new();
        for (key, value) in &self.passthrough {
            raw.insert(key.clone(), value.clone());
        }
        for (field, value) in &self.fields {
            raw.insert(field.as_str().to_string(), Value::String(value.clone()));
        }
        raw
    }
}

impl From<NameplateRecord> for Map<String, Value> {
    fn from(record: NameplateRecord) -> Self {
        let mut map = Map::new();
        for (key, value) in record.passthrough {
            map.insert(key, value);
        }
        for (field, value) in record.fields {
            map.insert(field.as_str().to_string(), Value::String(value));
        }
        if !record.other_fields.is_empty() {
            map.insert(
                OTHER_FIELDS_KEY.to_string(),
                Value::Object(record.other_fields.into_iter().collect()),
            );
        }
        if let Some(metadata) = record.metadata {
            if let Ok(value) = serde_json::to_value(metadata) {
                map.insert(METADATA_KEY.to_string(), value);
            }
        }
        map
    }
}

impl From<Map<String, Value>> for NameplateRecord {
    /// Lenient reader for saved documents: unknown top-level keys land in
    /// `other_fields`, unparseable metadata is kept as a pass-through value.
    fn from(map: Map<String, Value>) -> Self {
        let mut record = NameplateRecord::new();
        let mut metadata = None;
        for (key, value) in map {
            if key == METADATA_KEY {
                match serde_json::from_value::<RecordMetadata>(value.clone()) {
                    Ok(parsed) => metadata = Some(parsed),
                    Err(_) => {
                        record.passthrough.insert(key, value);
                    }
                }
            } else if key.starts_with(METADATA_PREFIX) {
                record.passthrough.insert(key, value);
            } else if key == OTHER_FIELDS_KEY {
                if let Value::Object(entries) = value {
                    record.other_fields.extend(entries);
                }
            } else if let Ok(field) = key.parse::<CanonicalField>() {
                match value {
                    Value::String(s) => {
                        record.fields.insert(field, s);
                    }
                    Value::Null => {}
                    other => {
                        record.fields.insert(field, other.to_string());
                    }
                }
            } else {
                record.other_fields.insert(key, value);
            }
        }
        record.metadata = metadata;
        record
    }
}
