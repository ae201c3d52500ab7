use recon_model::{JobId, JobStatus};
use tokio::sync::mpsc;

use crate::subscan::SubScanSummary;

/// Notifications flowing from background tasks and commands back to the
/// session that owns the view.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Ground truth changed server-side; re-read the job listing.
    RegistryRefreshRequested,
    /// Re-read the detail of this job if it is still the open one.
    DetailRefreshRequested(JobId),
    /// The job no longer exists; close it if it is open.
    JobRemoved(JobId),
    ProgressUpdated { job_id: JobId, percent: f64 },
    JobFinished { job_id: JobId, status: JobStatus },
    SubScanProgress { job_id: JobId, tick: u32, percent: f64 },
    SubScanCompleted { job_id: JobId, summary: SubScanSummary },
}

pub type EventSender = mpsc::UnboundedSender<SyncEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SyncEvent>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
