use std::sync::Arc;

use recon_model::{JobDetail, JobId, JobSummary, PageRequest};
use tracing::debug;

use crate::{api::ScanApi, error::Result};

/// Read side of the API: job listing and single-job snapshots.
///
/// Holds nothing but the pagination cursor; every call goes to the server.
#[derive(Debug, Clone)]
pub struct JobRegistry {
    api: Arc<dyn ScanApi>,
    page_size: u32,
    page: u32,
}

impl JobRegistry {
    pub fn new(api: Arc<dyn ScanApi>, page_size: u32) -> Self {
        Self {
            api,
            page_size: page_size.max(1),
            page: 0,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page;
    }

    pub fn next_page(&mut self) {
        self.page = self.page.saturating_add(1);
    }

    pub fn prev_page(&mut self) {
        self.page = self.page.saturating_sub(1);
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest::page(self.page_size, self.page)
    }

    /// Current page of jobs. An empty page is a normal result.
    pub async fn list(&self) -> Result<Vec<JobSummary>> {
        let page = self.page_request();
        let jobs = self.api.list_scans(page).await?;
        debug!(
            limit = page.limit,
            offset = page.offset,
            count = jobs.len(),
            "fetched job listing"
        );
        Ok(jobs)
    }

    /// Full detail. A missing job surfaces as an API not-found error.
    pub async fn get(&self, job_id: &JobId) -> Result<JobDetail> {
        Ok(self.api.scan_detail(job_id).await?)
    }

    pub async fn get_document(
        &self,
        job_id: &JobId,
    ) -> Result<serde_json::Value> {
        Ok(self.api.scan_document(job_id).await?)
    }
}
