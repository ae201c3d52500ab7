use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::UnknownVariant;

/// Treat an explicit JSON `null` the same as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One discovered host within a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subdomain {
    /// Server-assigned, stable within a job.
    pub id: i64,
    #[serde(rename = "subdomain")]
    pub hostname: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_live: bool,
    #[serde(default)]
    pub http_status: Option<u16>,
    #[serde(default)]
    pub response_time: Option<ResponseTime>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub final_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub webserver: Option<String>,
    #[serde(default)]
    pub cdn_name: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content_length: Option<u64>,
    /// Primary IP the HTTP check connected to.
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub technologies: Vec<Technology>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ipv4_addresses: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ipv6_addresses: Vec<String>,
    /// Status codes seen along the redirect chain.
    #[serde(default, deserialize_with = "null_as_default")]
    pub chain_status_codes: Vec<u16>,
    #[serde(default)]
    pub discovered_by: Option<String>,
}

impl Subdomain {
    pub fn https_url(&self) -> String {
        format!("https://{}", self.hostname)
    }

    pub fn http_url(&self) -> String {
        format!("http://{}", self.hostname)
    }
}

/// HTTP response latency. httpx reports a duration string (`"182.4ms"`), the
/// database column stores integer milliseconds; both show up on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseTime {
    Millis(f64),
    Text(String),
}

impl fmt::Display for ResponseTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseTime::Millis(ms) => write!(f, "{ms}ms"),
            ResponseTime::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Technology {
    Named {
        name: String,
        #[serde(default)]
        version: Option<String>,
    },
    Plain(String),
}

impl Technology {
    pub fn name(&self) -> &str {
        match self {
            Technology::Named { name, .. } => name,
            Technology::Plain(name) => name,
        }
    }
}

/// WAF fingerprint result for one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WafDetection {
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_waf: bool,
    #[serde(default)]
    pub waf_name: Option<String>,
    #[serde(default)]
    pub waf_manufacturer: Option<String>,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash,
    Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = UnknownVariant;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            _ => Err(UnknownVariant::new("severity", raw)),
        }
    }
}

impl TryFrom<String> for Severity {
    type Error = UnknownVariant;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<Severity> for String {
    fn from(severity: Severity) -> Self {
        severity.as_str().to_string()
    }
}

/// A reachable source/config artifact found under a live host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakDetection {
    pub base_url: String,
    pub leaked_file_url: String,
    #[serde(default)]
    pub http_status: Option<u16>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

impl LeakDetection {
    /// Severity as displayed; the scanner leaves it unset for most hits.
    pub fn effective_severity(&self) -> Severity {
        self.severity.unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    pub id: i64,
    pub url: String,
    pub filename: String,
    /// Relative to the server origin, not the API prefix.
    pub file_path: String,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subdomain_decodes_sparse_and_null_fields() {
        let sub: Subdomain = serde_json::from_value(json!({
            "id": 7,
            "subdomain": "api.example.com",
            "is_live": true,
            "http_status": 200,
            "technologies": null,
            "response_time": "182.4ms",
        }))
        .unwrap();

        assert_eq!(sub.hostname, "api.example.com");
        assert!(sub.technologies.is_empty());
        assert_eq!(
            sub.response_time,
            Some(ResponseTime::Text("182.4ms".into()))
        );
        assert_eq!(sub.https_url(), "https://api.example.com");
    }

    #[test]
    fn technologies_accept_objects_and_strings() {
        let techs: Vec<Technology> =
            serde_json::from_value(json!([{"name": "nginx"}, "React"]))
                .unwrap();
        let names: Vec<_> = techs.iter().map(Technology::name).collect();
        assert_eq!(names, ["nginx", "React"]);
    }

    #[test]
    fn leak_severity_defaults_to_medium() {
        let leak: LeakDetection = serde_json::from_value(json!({
            "base_url": "https://a.example.com",
            "leaked_file_url": "https://a.example.com/.git/config",
            "severity": null,
        }))
        .unwrap();
        assert_eq!(leak.effective_severity(), Severity::Medium);
    }

    #[test]
    fn unknown_severity_is_a_decode_error() {
        let err = serde_json::from_value::<LeakDetection>(json!({
            "base_url": "https://a.example.com",
            "leaked_file_url": "https://a.example.com/.env",
            "severity": "catastrophic",
        }))
        .unwrap_err();
        assert!(err.to_string().contains("unknown severity 'catastrophic'"));
    }
}
