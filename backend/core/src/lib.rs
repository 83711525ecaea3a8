//! Core types for nameplate extraction: the canonical schema, normalized
//! records, validation, bulk job bookkeeping and the backend traits.

pub mod error;
pub mod job;
pub mod record;
pub mod schema;
pub mod summary;
pub mod traits;
pub mod validation;

pub use error::NameplateError;
pub use job::{BulkItemResult, BulkJob, JobStatus};
pub use record::{
    NameplateRecord, ProcessingMode, RecordMetadata, RecordSource, METADATA_KEY, METADATA_PREFIX,
    OTHER_FIELDS_KEY,
};
pub use schema::{
    is_allowed_category, CanonicalField, FieldCategory, FieldGroup, UnknownField,
    ALLOWED_CATEGORIES, DEFAULT_REQUIRED_FIELDS,
};
pub use summary::{ImageFailure, ProcessingSummary};
pub use traits::{BulkJobBackend, ImageInput, OcrBackend, RawFields};
pub use validation::{validate, ValidationResult};
