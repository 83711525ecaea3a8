//! Hybrid dispatch of nameplate images: small sets go through one OCR call
//! per image, larger sets through polled bulk jobs. Also owns the JSON
//! outputs, the bulk job registry and processing reports.

pub mod deferred;
pub mod images;
pub mod immediate;
pub mod output;
pub mod policy;
pub mod registry;
pub mod report;

pub use deferred::{DeferredPath, DeferredSettings};
pub use images::{detect_mime_type, is_supported_image, list_images, load_image, SUPPORTED_EXTENSIONS};
pub use immediate::ImmediatePath;
pub use output::{file_timestamp, load_json_safe, save_json, OutputStore, SummaryDocument};
pub use policy::DispatchPolicy;
pub use registry::{JobRegistry, JobStats};
pub use report::{revalidate, FileValidation, FullReport, ProcessingInfo};
