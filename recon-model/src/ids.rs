use serde::{Deserialize, Serialize};

/// Opaque, server-assigned job identifier.
///
/// The API hands out UUID strings today but the client never interprets them,
/// so the id stays a string.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(raw: impl Into<String>) -> Self {
        JobId(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(raw: String) -> Self {
        JobId(raw)
    }
}

impl From<&str> for JobId {
    fn from(raw: &str) -> Self {
        JobId(raw.to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
