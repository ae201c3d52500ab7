use std::time::Duration;

use async_trait::async_trait;
use recon_model::{
    AddSubdomainRequest, BulkScanAccepted, BulkScanRequest, CommandAck,
    CreateScanRequest, DeletionReport, JobId, JobSummary, LeakScanAccepted,
    LeakScanRequest, PageRequest, ProgressSnapshot, ScanAccepted,
};
use reqwest::{Client, RequestBuilder};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::{
    error::{ApiError, extract_detail},
    routes::{utils, v1},
    service::{ApiResult, ScanApi},
};

/// reqwest-backed [`ScanApi`].
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Add `http://` when no scheme was given and drop trailing slashes and a
/// trailing `/api/v1`, so `localhost:8000/api/v1/` and `http://localhost:8000`
/// address the same server.
fn normalize(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let trimmed = trimmed
        .strip_suffix(v1::ROOT)
        .unwrap_or(trimmed)
        .trim_end_matches('/');
    let normalized =
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("http://{trimmed}")
        };

    if normalized != raw {
        debug!(from = raw, to = %normalized, "normalized server URL");
    }
    normalized
}

impl ApiClient {
    /// `timeout` of `None` leaves reqwest's default (no overall timeout).
    pub fn new(
        base_url: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, ApiError> {
        let base_url = normalize(base_url);
        Url::parse(&base_url).map_err(|source| ApiError::Url {
            url: base_url.clone(),
            source,
        })?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(ApiError::ClientBuild)?;

        info!(base_url = %base_url, "created scan API client");
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a versioned API path.
    pub fn build_url(&self, path: impl AsRef<str>) -> String {
        let path = path.as_ref();
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with(v1::ROOT) {
            format!("{}{}", self.base_url, path)
        } else {
            let path = path.trim_start_matches('/');
            format!("{}{}/{}", self.base_url, v1::ROOT, path)
        }
    }

    /// Resolve a server-relative asset path against the server origin.
    /// Assets live outside the `/api/v1` prefix.
    pub fn asset_url(&self, file_path: &str) -> Result<String, ApiError> {
        let origin = format!("{}/", self.base_url);
        let base = Url::parse(&origin).map_err(|source| ApiError::Url {
            url: origin.clone(),
            source,
        })?;
        let joined = base
            .join(file_path.trim_start_matches('/'))
            .map_err(|source| ApiError::Url {
                url: file_path.to_string(),
                source,
            })?;
        Ok(joined.into())
    }

    async fn send(
        &self,
        url: String,
        request: RequestBuilder,
    ) -> ApiResult<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = extract_detail(&body);
        warn!(
            url = %url,
            status = status.as_u16(),
            detail = ?detail,
            "request rejected"
        );
        Err(ApiError::Status { status, detail })
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        what: &'static str,
        url: String,
        request: RequestBuilder,
    ) -> ApiResult<T> {
        let response = self.send(url.clone(), request).await?;
        let body = response
            .text()
            .await
            .map_err(|source| ApiError::Transport { url, source })?;
        serde_json::from_str(&body)
            .map_err(|source| ApiError::Decode { what, source })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        what: &'static str,
        path: &str,
    ) -> ApiResult<T> {
        let url = self.build_url(path);
        debug!(url = %url, "GET");
        let request = self.client.get(&url);
        self.execute(what, url, request).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        what: &'static str,
        path: &str,
        body: Option<&B>,
    ) -> ApiResult<T> {
        let url = self.build_url(path);
        debug!(url = %url, "POST");
        let mut request = self.client.post(&url);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.execute(what, url, request).await
    }

    async fn delete<T: DeserializeOwned>(
        &self,
        what: &'static str,
        path: &str,
    ) -> ApiResult<T> {
        let url = self.build_url(path);
        debug!(url = %url, "DELETE");
        let request = self.client.delete(&url);
        self.execute(what, url, request).await
    }
}

#[async_trait]
impl ScanApi for ApiClient {
    async fn list_scans(
        &self,
        page: PageRequest,
    ) -> ApiResult<Vec<JobSummary>> {
        let path = utils::with_query(
            v1::scans::COLLECTION,
            &[
                ("limit", page.limit.to_string()),
                ("offset", page.offset.to_string()),
            ],
        );
        self.get("job listing", &path).await
    }

    async fn scan_document(&self, job_id: &JobId) -> ApiResult<Value> {
        self.get("job detail", &utils::with_id(v1::scans::ITEM, job_id))
            .await
    }

    async fn scan_progress(
        &self,
        job_id: &JobId,
    ) -> ApiResult<ProgressSnapshot> {
        self.get("progress", &utils::with_id(v1::scans::PROGRESS, job_id))
            .await
    }

    async fn create_scan(
        &self,
        request: &CreateScanRequest,
    ) -> ApiResult<ScanAccepted> {
        self.post("scan acknowledgement", v1::scans::COLLECTION, Some(request))
            .await
    }

    async fn create_bulk_scans(
        &self,
        request: &BulkScanRequest,
    ) -> ApiResult<BulkScanAccepted> {
        self.post("bulk scan acknowledgement", v1::scans::BULK, Some(request))
            .await
    }

    async fn stop_scan(&self, job_id: &JobId) -> ApiResult<CommandAck> {
        self.post::<_, Value>(
            "stop acknowledgement",
            &utils::with_id(v1::scans::STOP, job_id),
            None,
        )
        .await
    }

    async fn delete_scan(&self, job_id: &JobId) -> ApiResult<DeletionReport> {
        self.delete("deletion report", &utils::with_id(v1::scans::ITEM, job_id))
            .await
    }

    async fn force_delete_scan(
        &self,
        job_id: &JobId,
    ) -> ApiResult<DeletionReport> {
        self.delete(
            "force deletion report",
            &utils::with_id(v1::scans::FORCE, job_id),
        )
        .await
    }

    async fn start_leak_scan(
        &self,
        job_id: &JobId,
        request: &LeakScanRequest,
    ) -> ApiResult<LeakScanAccepted> {
        self.post(
            "leak scan acknowledgement",
            &utils::with_id(v1::scans::LEAK_SCAN, job_id),
            Some(request),
        )
        .await
    }

    async fn add_subdomain(
        &self,
        job_id: &JobId,
        request: &AddSubdomainRequest,
    ) -> ApiResult<CommandAck> {
        self.post(
            "subdomain acknowledgement",
            &utils::with_id(v1::scans::SUBDOMAINS, job_id),
            Some(request),
        )
        .await
    }

    async fn fetch_asset(&self, file_path: &str) -> ApiResult<Vec<u8>> {
        let url = self.asset_url(file_path)?;
        debug!(url = %url, "GET asset");
        let request = self.client.get(&url);
        let response = self.send(url.clone(), request).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| ApiError::Transport { url, source })?;
        Ok(bytes.to_vec())
    }
}
