use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use recon_model::{
    AddSubdomainRequest, BulkScanAccepted, BulkScanRequest, CommandAck,
    CreateScanRequest, DeletionReport, JobId, JobSummary, LeakScanAccepted,
    LeakScanRequest, PageRequest, ProgressSnapshot, ScanAccepted,
};
use reqwest::StatusCode;
use serde_json::Value;

use crate::api::{ApiError, ScanApi, service::ApiResult};

/// Scripted HTTP failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubFailure {
    pub status: u16,
    pub detail: Option<String>,
}

impl StubFailure {
    pub fn new(status: u16, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: Some(detail.into()),
        }
    }

    fn to_error(&self) -> ApiError {
        ApiError::Status {
            status: StatusCode::from_u16(self.status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            detail: self.detail.clone(),
        }
    }
}

/// Queue whose final entry repeats once the earlier ones are used up.
#[derive(Debug)]
struct Script<T>(VecDeque<T>);

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self(VecDeque::new())
    }
}

impl<T: Clone> Script<T> {
    fn push(&mut self, item: T) {
        self.0.push_back(item);
    }

    fn next(&mut self) -> Option<T> {
        if self.0.len() > 1 {
            self.0.pop_front()
        } else {
            self.0.front().cloned()
        }
    }
}

#[derive(Debug, Default)]
struct StubState {
    listings: Script<Vec<JobSummary>>,
    documents: HashMap<JobId, Script<Result<Value, StubFailure>>>,
    progress: HashMap<JobId, Script<Result<ProgressSnapshot, StubFailure>>>,
    deletions: Script<DeletionReport>,
    failures: HashMap<&'static str, StubFailure>,
    assets: HashMap<String, Vec<u8>>,
    created: usize,
    calls: Vec<String>,
}

/// In-memory [`ScanApi`] with scripted responses and a request log.
#[derive(Debug, Clone, Default)]
pub struct StubScanApi {
    inner: Arc<Mutex<StubState>>,
}

impl StubScanApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_listing(&self, jobs: Vec<JobSummary>) {
        self.inner.lock().listings.push(jobs);
    }

    pub fn push_document(&self, job_id: impl Into<JobId>, document: Value) {
        self.inner
            .lock()
            .documents
            .entry(job_id.into())
            .or_default()
            .push(Ok(document));
    }

    pub fn push_document_failure(
        &self,
        job_id: impl Into<JobId>,
        failure: StubFailure,
    ) {
        self.inner
            .lock()
            .documents
            .entry(job_id.into())
            .or_default()
            .push(Err(failure));
    }

    pub fn push_progress(
        &self,
        job_id: impl Into<JobId>,
        snapshot: ProgressSnapshot,
    ) {
        self.inner
            .lock()
            .progress
            .entry(job_id.into())
            .or_default()
            .push(Ok(snapshot));
    }

    pub fn push_progress_failure(
        &self,
        job_id: impl Into<JobId>,
        failure: StubFailure,
    ) {
        self.inner
            .lock()
            .progress
            .entry(job_id.into())
            .or_default()
            .push(Err(failure));
    }

    pub fn push_deletion(&self, report: DeletionReport) {
        self.inner.lock().deletions.push(report);
    }

    pub fn put_asset(&self, path: impl Into<String>, bytes: Vec<u8>) {
        self.inner.lock().assets.insert(path.into(), bytes);
    }

    /// Make every call to `method` fail until
    /// [`clear_failure`](Self::clear_failure).
    pub fn fail(&self, method: &'static str, failure: StubFailure) {
        self.inner.lock().failures.insert(method, failure);
    }

    pub fn clear_failure(&self, method: &'static str) {
        self.inner.lock().failures.remove(method);
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(
        &self,
        method: &'static str,
        call: String,
    ) -> Result<parking_lot::MutexGuard<'_, StubState>, ApiError> {
        let mut state = self.inner.lock();
        state.calls.push(call);
        if let Some(failure) = state.failures.get(method) {
            return Err(failure.to_error());
        }
        Ok(state)
    }

    /// Like `record` for calls that read no scripted state.
    fn log_call(
        &self,
        method: &'static str,
        call: String,
    ) -> Result<(), ApiError> {
        self.record(method, call).map(drop)
    }
}

fn not_found() -> ApiError {
    ApiError::Status {
        status: StatusCode::NOT_FOUND,
        detail: Some("Scan job not found".into()),
    }
}

#[async_trait]
impl ScanApi for StubScanApi {
    async fn list_scans(
        &self,
        page: PageRequest,
    ) -> ApiResult<Vec<JobSummary>> {
        let mut state = self.record(
            "list_scans",
            format!("list_scans limit={} offset={}", page.limit, page.offset),
        )?;
        Ok(state.listings.next().unwrap_or_default())
    }

    async fn scan_document(&self, job_id: &JobId) -> ApiResult<Value> {
        let mut state =
            self.record("scan_document", format!("scan_document {job_id}"))?;
        match state.documents.get_mut(job_id).and_then(Script::next) {
            Some(Ok(document)) => Ok(document),
            Some(Err(failure)) => Err(failure.to_error()),
            None => Err(not_found()),
        }
    }

    async fn scan_progress(
        &self,
        job_id: &JobId,
    ) -> ApiResult<ProgressSnapshot> {
        let mut state =
            self.record("scan_progress", format!("scan_progress {job_id}"))?;
        match state.progress.get_mut(job_id).and_then(Script::next) {
            Some(Ok(snapshot)) => Ok(snapshot),
            Some(Err(failure)) => Err(failure.to_error()),
            None => Err(not_found()),
        }
    }

    async fn create_scan(
        &self,
        request: &CreateScanRequest,
    ) -> ApiResult<ScanAccepted> {
        let mut state = self
            .record("create_scan", format!("create_scan {}", request.domain))?;
        state.created += 1;
        Ok(ScanAccepted {
            job_id: JobId::new(format!("job-{}", state.created)),
            domain: request.domain.clone(),
            status: "pending".into(),
            message: format!("Scan started for {}", request.domain),
        })
    }

    async fn create_bulk_scans(
        &self,
        request: &BulkScanRequest,
    ) -> ApiResult<BulkScanAccepted> {
        let mut state = self.record(
            "create_bulk_scans",
            format!("create_bulk_scans {}", request.domains.join(",")),
        )?;
        let mut jobs = Vec::with_capacity(request.domains.len());
        for domain in &request.domains {
            state.created += 1;
            jobs.push(ScanAccepted {
                job_id: JobId::new(format!("job-{}", state.created)),
                domain: domain.clone(),
                status: "pending".into(),
                message: format!("Scan started for {domain}"),
            });
        }
        Ok(BulkScanAccepted {
            total_submitted: jobs.len() as u64,
            jobs,
            message: format!("Submitted {} scans", request.domains.len()),
        })
    }

    async fn stop_scan(&self, job_id: &JobId) -> ApiResult<CommandAck> {
        self.log_call("stop_scan", format!("stop_scan {job_id}"))?;
        Ok(CommandAck {
            message: format!("Scan job {job_id} stopped"),
            job_id: Some(job_id.clone()),
        })
    }

    async fn delete_scan(&self, job_id: &JobId) -> ApiResult<DeletionReport> {
        let mut state =
            self.record("delete_scan", format!("delete_scan {job_id}"))?;
        Ok(state.deletions.next().unwrap_or_else(|| DeletionReport {
            message: format!("Scan job {job_id} deleted successfully"),
            deleted_items: None,
        }))
    }

    async fn force_delete_scan(
        &self,
        job_id: &JobId,
    ) -> ApiResult<DeletionReport> {
        let mut state = self.record(
            "force_delete_scan",
            format!("force_delete_scan {job_id}"),
        )?;
        Ok(state.deletions.next().unwrap_or_else(|| DeletionReport {
            message: format!("Scan job {job_id} force deleted"),
            deleted_items: None,
        }))
    }

    async fn start_leak_scan(
        &self,
        job_id: &JobId,
        request: &LeakScanRequest,
    ) -> ApiResult<LeakScanAccepted> {
        self.log_call(
            "start_leak_scan",
            format!(
                "start_leak_scan {job_id} {} {}",
                request.mode,
                request.urls.join(",")
            ),
        )?;
        Ok(LeakScanAccepted {
            task_id: format!("leak-{job_id}"),
            urls_to_scan: request.urls.len() as u64,
            mode: request.mode.to_string(),
            message: format!(
                "Leak scan queued for {} URLs",
                request.urls.len()
            ),
        })
    }

    async fn add_subdomain(
        &self,
        job_id: &JobId,
        request: &AddSubdomainRequest,
    ) -> ApiResult<CommandAck> {
        let body = serde_json::to_string(request).unwrap_or_default();
        self.log_call(
            "add_subdomain",
            format!("add_subdomain {job_id} {body}"),
        )?;
        Ok(CommandAck {
            message: format!("Subdomain {} added", request.subdomain),
            job_id: Some(job_id.clone()),
        })
    }

    async fn fetch_asset(&self, file_path: &str) -> ApiResult<Vec<u8>> {
        let state =
            self.record("fetch_asset", format!("fetch_asset {file_path}"))?;
        state.assets.get(file_path).cloned().ok_or_else(not_found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recon_model::LeakScanMode;

    #[tokio::test]
    async fn log_only_calls_release_the_state_lock() {
        let api = StubScanApi::new();
        let job = JobId::new("job-1");

        api.stop_scan(&job).await.unwrap();
        api.stop_scan(&job).await.unwrap();
        assert_eq!(api.count_calls("stop_scan"), 2);
        // The log is readable right after, so no guard outlived the call.
        assert_eq!(api.calls().len(), 2);
    }

    #[tokio::test]
    async fn scripted_failure_is_logged_then_returned() {
        let api = StubScanApi::new();
        api.fail("start_leak_scan", StubFailure::new(409, "already running"));

        let err = api
            .start_leak_scan(
                &JobId::new("job-1"),
                &LeakScanRequest {
                    urls: vec!["https://b.example.com".into()],
                    mode: LeakScanMode::Tiny,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.detail(), Some("already running"));
        assert_eq!(
            api.calls(),
            ["start_leak_scan job-1 tiny https://b.example.com"]
        );
    }
}
