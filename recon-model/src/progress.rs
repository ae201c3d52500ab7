use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{error::UnknownVariant, ids::JobId, status::JobStatus};

/// Body of `GET /scans/{id}/progress`.
///
/// `status` stays a raw string: the progress endpoint reports worker states
/// (`retrying`, `unknown`) that are not job states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    #[serde(default)]
    pub job_id: Option<JobId>,
    pub status: String,
    /// Free-form worker payload; only `current` is interpreted.
    #[serde(default)]
    pub progress: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub db_status: Option<String>,
}

impl ProgressSnapshot {
    pub fn status(&self) -> Result<JobStatus, UnknownVariant> {
        self.status.parse()
    }

    /// `progress.current` clamped to `0..=100`, when numeric.
    pub fn percent(&self) -> Option<f64> {
        let current = self.progress.as_ref()?.get("current")?.as_f64()?;
        if current.is_nan() {
            return None;
        }
        Some(current.clamp(0.0, 100.0))
    }
}
