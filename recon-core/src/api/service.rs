use std::fmt::Debug;

use async_trait::async_trait;
use recon_model::{
    AddSubdomainRequest, BulkScanAccepted, BulkScanRequest, CommandAck,
    CreateScanRequest, DeletionReport, JobDetail, JobId, JobSummary,
    LeakScanAccepted, LeakScanRequest, PageRequest, ProgressSnapshot,
    ScanAccepted,
};
use serde_json::Value;

use super::error::ApiError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Everything the engine asks of the scanning server.
///
/// [`ApiClient`](super::ApiClient) is the HTTP implementation; tests drive
/// the engine through a scripted stub instead.
#[async_trait]
pub trait ScanApi: Send + Sync + Debug {
    async fn list_scans(&self, page: PageRequest) -> ApiResult<Vec<JobSummary>>;

    /// Job detail as the server sent it, including fields the model ignores.
    async fn scan_document(&self, job_id: &JobId) -> ApiResult<Value>;

    async fn scan_detail(&self, job_id: &JobId) -> ApiResult<JobDetail> {
        let document = self.scan_document(job_id).await?;
        serde_json::from_value(document).map_err(|source| ApiError::Decode {
            what: "job detail",
            source,
        })
    }

    async fn scan_progress(
        &self,
        job_id: &JobId,
    ) -> ApiResult<ProgressSnapshot>;

    async fn create_scan(
        &self,
        request: &CreateScanRequest,
    ) -> ApiResult<ScanAccepted>;

    async fn create_bulk_scans(
        &self,
        request: &BulkScanRequest,
    ) -> ApiResult<BulkScanAccepted>;

    async fn stop_scan(&self, job_id: &JobId) -> ApiResult<CommandAck>;

    async fn delete_scan(&self, job_id: &JobId) -> ApiResult<DeletionReport>;

    async fn force_delete_scan(
        &self,
        job_id: &JobId,
    ) -> ApiResult<DeletionReport>;

    async fn start_leak_scan(
        &self,
        job_id: &JobId,
        request: &LeakScanRequest,
    ) -> ApiResult<LeakScanAccepted>;

    async fn add_subdomain(
        &self,
        job_id: &JobId,
        request: &AddSubdomainRequest,
    ) -> ApiResult<CommandAck>;

    /// Raw bytes of a server-relative asset such as a screenshot.
    async fn fetch_asset(&self, file_path: &str) -> ApiResult<Vec<u8>>;
}
