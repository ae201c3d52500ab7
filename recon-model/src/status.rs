use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::UnknownVariant;

/// Lifecycle state of a scan job.
///
/// `Pending -> Running -> {Completed, Failed, Cancelled}`. Transitions only
/// ever happen server-side; the client reads them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Operator actions offered on a job card / detail view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobAction {
    View,
    Export,
    Stop,
    Delete,
    ForceDelete,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self {
            JobStatus::Pending | JobStatus::Running => false,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => {
                true
            }
        }
    }

    /// Position along the state machine, used to refuse back-dating a
    /// displayed status.
    pub fn rank(&self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Running => 1,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled => {
                2
            }
        }
    }

    pub fn allows(&self, action: JobAction) -> bool {
        match action {
            JobAction::View | JobAction::Export => true,
            JobAction::Stop | JobAction::ForceDelete => !self.is_terminal(),
            JobAction::Delete => self.is_terminal(),
        }
    }

    pub fn available_actions(&self) -> Vec<JobAction> {
        [
            JobAction::View,
            JobAction::Export,
            JobAction::Stop,
            JobAction::Delete,
            JobAction::ForceDelete,
        ]
        .into_iter()
        .filter(|action| self.allows(*action))
        .collect()
    }
}

impl JobAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobAction::View => "view",
            JobAction::Export => "export",
            JobAction::Stop => "stop",
            JobAction::Delete => "delete",
            JobAction::ForceDelete => "force-delete",
        }
    }

    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            JobAction::Stop | JobAction::Delete | JobAction::ForceDelete
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for JobAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownVariant;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" | "canceled" => Ok(JobStatus::Cancelled),
            _ => Err(UnknownVariant::new("job status", raw)),
        }
    }
}

impl TryFrom<String> for JobStatus {
    type Error = UnknownVariant;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}
