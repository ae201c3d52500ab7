use recon_model::{JobAction, JobStatus, UnknownVariant};
use thiserror::Error;

use crate::api::ApiError;

/// Input rejected before any request was issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("please enter a domain")]
    EmptyDomain,
    #[error("'{0}' is not a valid domain")]
    MalformedDomain(String),
    #[error("no valid domains in input")]
    NoValidDomains,
    #[error("select at least one URL to scan")]
    EmptySelection,
    #[error("no eligible URLs: {reason}")]
    NoEligibleUrls { reason: NoEligibleReason },
    #[error("'{0}' is not an eligible URL for this job")]
    NotACandidate(String),
    #[error("please enter a subdomain")]
    EmptySubdomain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoEligibleReason {
    NoLiveHosts,
    AllBehindWaf,
}

impl std::fmt::Display for NoEligibleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoEligibleReason::NoLiveHosts => f.write_str("no live hosts"),
            NoEligibleReason::AllBehindWaf => {
                f.write_str("every live host is behind a WAF")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("cannot {action} a {status} job")]
    ActionNotAllowed { action: JobAction, status: JobStatus },
    #[error("{action} cancelled by operator")]
    Declined { action: JobAction },
    #[error("no job is open")]
    NoJobOpen,
    #[error("job is {0}, selective scans need a completed job")]
    NotCompleted(JobStatus),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    UnknownVariant(#[from] UnknownVariant),
}

impl ReconError {
    /// Whether the failure happened before any request reached the server.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ReconError::Validation(_)
                | ReconError::ActionNotAllowed { .. }
                | ReconError::Declined { .. }
                | ReconError::NoJobOpen
                | ReconError::NotCompleted(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ReconError>;
