//! Core data model definitions shared across recon crates.
//!
//! Everything here mirrors the JSON the scanning API speaks. The server owns
//! every record; these types are transient snapshots the client decodes,
//! displays and throws away on the next refresh.
#![allow(missing_docs)]

pub mod error;
pub mod ids;
pub mod job;
pub mod progress;
pub mod records;
pub mod requests;
pub mod status;
pub mod timestamp;

// Intentionally curated re-exports for downstream consumers.
pub use error::{Result as ModelResult, UnknownVariant};
pub use ids::JobId;
pub use job::{JobDetail, JobLike, JobSummary};
pub use progress::ProgressSnapshot;
pub use records::{
    LeakDetection, ResponseTime, Screenshot, Severity, Subdomain, Technology,
    WafDetection,
};
pub use requests::{
    AddSubdomainRequest, BulkScanAccepted, BulkScanRequest, CommandAck,
    CreateScanRequest, DeletedItems, DeletionReport, LeakScanAccepted,
    LeakScanMode, LeakScanRequest, PageRequest, ScanAccepted,
};
pub use status::{JobAction, JobStatus};
