use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),
    #[error("invalid server URL '{url}'")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{}", status_line(*status, detail.as_deref()))]
    Status {
        status: StatusCode,
        detail: Option<String>,
    },
    #[error("failed to decode {what}: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Server-provided `detail`, when the error body carried one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

/// A server detail message wins over the generic status line.
fn status_line(status: StatusCode, detail: Option<&str>) -> String {
    match detail {
        Some(detail) => format!("HTTP {}: {detail}", status.as_u16()),
        None => format!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("request failed")
        ),
    }
}

/// Pull `detail` out of a FastAPI error body. Non-string details are
/// rendered as compact JSON; a non-JSON body is used as-is when non-empty.
pub(crate) fn extract_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Object(map)) => match map.get("detail") {
            Some(serde_json::Value::String(text)) => Some(text.clone()),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        },
        Ok(_) => None,
        Err(_) => Some(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_takes_precedence_over_reason() {
        let err = ApiError::Status {
            status: StatusCode::BAD_REQUEST,
            detail: Some("Cannot stop scan in completed state".into()),
        };
        assert_eq!(
            err.to_string(),
            "HTTP 400: Cannot stop scan in completed state"
        );

        let bare = ApiError::Status {
            status: StatusCode::BAD_GATEWAY,
            detail: None,
        };
        assert_eq!(bare.to_string(), "HTTP 502: Bad Gateway");
    }

    #[test]
    fn extracts_string_and_structured_details() {
        assert_eq!(
            extract_detail(r#"{"detail":"Scan job not found"}"#).as_deref(),
            Some("Scan job not found")
        );
        assert_eq!(
            extract_detail(r#"{"detail":[{"loc":["body","domain"]}]}"#)
                .as_deref(),
            Some(r#"[{"loc":["body","domain"]}]"#)
        );
        assert_eq!(extract_detail(r#"{"error":"x"}"#), None);
        assert_eq!(
            extract_detail("upstream timeout").as_deref(),
            Some("upstream timeout")
        );
        assert_eq!(extract_detail("  "), None);
    }
}
