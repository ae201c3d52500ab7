//! Request and acknowledgement bodies for the mutating endpoints.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{error::UnknownVariant, ids::JobId, records::null_as_default};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateScanRequest {
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanAccepted {
    pub job_id: JobId,
    pub domain: String,
    pub status: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkScanRequest {
    pub domains: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkScanAccepted {
    pub total_submitted: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub jobs: Vec<ScanAccepted>,
    #[serde(default)]
    pub message: String,
}

/// Plain `{message}` acknowledgement (stop, add-subdomain).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAck {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub job_id: Option<JobId>,
}

/// Body of delete and force-delete. Counts are the server's, shown as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionReport {
    #[serde(default)]
    pub message: String,
    /// Absent when the server only sent a message.
    #[serde(default)]
    pub deleted_items: Option<DeletedItems>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedItems {
    #[serde(default)]
    pub subdomains: u64,
    #[serde(default)]
    pub screenshots: u64,
    #[serde(default)]
    pub waf_detections: u64,
    #[serde(default)]
    pub leak_detections: u64,
    /// Only reported by force-delete. `None` means the server did not say.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_revoked: Option<bool>,
}

/// Depth of a selective leak scan.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum LeakScanMode {
    /// Small wordlist of high-signal paths.
    #[default]
    Tiny,
    Full,
}

impl LeakScanMode {
    pub const ALL: [LeakScanMode; 2] = [LeakScanMode::Tiny, LeakScanMode::Full];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeakScanMode::Tiny => "tiny",
            LeakScanMode::Full => "full",
        }
    }
}

impl fmt::Display for LeakScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeakScanMode {
    type Err = UnknownVariant;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "tiny" => Ok(LeakScanMode::Tiny),
            "full" => Ok(LeakScanMode::Full),
            _ => Err(UnknownVariant::new("leak scan mode", raw)),
        }
    }
}

impl TryFrom<String> for LeakScanMode {
    type Error = UnknownVariant;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<LeakScanMode> for String {
    fn from(mode: LeakScanMode) -> Self {
        mode.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakScanRequest {
    pub urls: Vec<String>,
    pub mode: LeakScanMode,
}

/// Acknowledgement of a selective leak scan. `mode` is echoed verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakScanAccepted {
    pub task_id: String,
    pub urls_to_scan: u64,
    pub mode: String,
    #[serde(default)]
    pub message: String,
}

/// Manually added subdomain. Unset optionals are omitted from the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddSubdomainRequest {
    pub subdomain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_live: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u32,
}

impl PageRequest {
    pub fn first(limit: u32) -> Self {
        Self { limit, offset: 0 }
    }

    pub fn page(limit: u32, index: u32) -> Self {
        Self {
            limit,
            offset: limit.saturating_mul(index),
        }
    }
}
