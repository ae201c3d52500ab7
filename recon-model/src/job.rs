use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    ids::JobId,
    records::{
        LeakDetection, Screenshot, Subdomain, WafDetection, null_as_default,
    },
    status::JobStatus,
};

/// Read-only view shared by list entries and full details.
pub trait JobLike {
    fn job_id(&self) -> &JobId;
    fn domain(&self) -> &str;
    fn status(&self) -> JobStatus;

    fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }
}

/// One row of the job listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: JobId,
    pub domain: String,
    pub status: JobStatus,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "crate::timestamp::option")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subdomains_count: u64,
    #[serde(default)]
    pub screenshots_count: u64,
}

/// Full snapshot of a job and everything the scanner attached to it.
///
/// A detail is always replaced whole on refresh; nothing in the client
/// patches one in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetail {
    pub job_id: JobId,
    pub domain: String,
    pub status: JobStatus,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "crate::timestamp::option")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subdomains: Vec<Subdomain>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub screenshots: Vec<Screenshot>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub waf_detections: Vec<WafDetection>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub leak_detections: Vec<LeakDetection>,
}

impl JobDetail {
    pub fn live_subdomains(&self) -> impl Iterator<Item = &Subdomain> {
        self.subdomains.iter().filter(|sub| sub.is_live)
    }

    pub fn live_count(&self) -> usize {
        self.live_subdomains().count()
    }

    pub fn leak_count(&self) -> usize {
        self.leak_detections.len()
    }

    pub fn subdomain(&self, id: i64) -> Option<&Subdomain> {
        self.subdomains.iter().find(|sub| sub.id == id)
    }
}

impl JobLike for JobSummary {
    fn job_id(&self) -> &JobId {
        &self.job_id
    }

    fn domain(&self) -> &str {
        &self.domain
    }

    fn status(&self) -> JobStatus {
        self.status
    }
}

impl JobLike for JobDetail {
    fn job_id(&self) -> &JobId {
        &self.job_id
    }

    fn domain(&self) -> &str {
        &self.domain
    }

    fn status(&self) -> JobStatus {
        self.status
    }
}
