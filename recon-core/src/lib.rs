//! Client-side synchronization engine for the recon scanning API.
//!
//! The server runs every scan; this crate keeps a client's view of those
//! jobs honest. It lists and fetches jobs, polls progress for running ones,
//! issues lifecycle commands behind an operator confirmation, runs selective
//! leak scans over a finished job's hosts and appends manual subdomains.
//! [`Session`] ties the pieces together for a front end.

pub mod api;
pub mod augment;
pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod lifecycle;
pub mod poller;
pub mod registry;
pub mod session;
pub mod subscan;
pub mod view;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use api::{ApiClient, ApiError, ScanApi};
pub use augment::{Liveness, ResultAugmenter, SubdomainDraft};
pub use config::{
    ConfigLoadError, ConfigSource, DashboardConfig, LeakScanConfig,
};
pub use error::{NoEligibleReason, ReconError, Result, ValidationError};
pub use events::SyncEvent;
pub use lifecycle::{
    ConfirmationRequest, JobRef, LifecycleController, OperatorPrompt,
};
pub use poller::ProgressPoller;
pub use registry::JobRegistry;
pub use session::{OpenJob, Session};
pub use subscan::{
    Candidate, SelectionSet, SubScanMonitor, SubScanOrchestrator,
    SubScanSummary,
};
pub use view::SubdomainFilter;

pub use recon_model as model;
