use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use recon_model::{
    BulkScanAccepted, BulkScanRequest, CommandAck, CreateScanRequest,
    DeletionReport, JobAction, JobId, JobStatus, ScanAccepted,
};
use tracing::info;

use crate::{
    api::ScanApi,
    error::{ReconError, Result, ValidationError},
    events::{EventSender, SyncEvent},
};

/// What the operator is asked before a destructive command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationRequest {
    pub action: JobAction,
    pub job_id: JobId,
    pub domain: String,
    pub message: String,
}

impl ConfirmationRequest {
    fn new(action: JobAction, job_id: &JobId, domain: &str) -> Self {
        let message = match action {
            JobAction::Stop => format!(
                "Stop the scan for {domain}? Results found so far are kept."
            ),
            JobAction::Delete => format!(
                "Delete the scan for {domain} and all of its subdomains, \
                 screenshots, WAF and leak detections? \
                 This cannot be undone."
            ),
            JobAction::ForceDelete => format!(
                "Force delete the scan for {domain}? The running task is \
                 terminated and all data is removed. This cannot be undone."
            ),
            JobAction::View | JobAction::Export => {
                format!("{action} the scan for {domain}?")
            }
        };
        Self {
            action,
            job_id: job_id.clone(),
            domain: domain.to_string(),
            message,
        }
    }
}

/// Operator confirmation for destructive commands.
#[async_trait]
pub trait OperatorPrompt: Send + Sync + Debug {
    async fn confirm(&self, request: &ConfirmationRequest) -> bool;
}

/// Target of a lifecycle command as last seen by the client.
#[derive(Debug, Clone, Copy)]
pub struct JobRef<'a> {
    pub job_id: &'a JobId,
    pub domain: &'a str,
    pub status: JobStatus,
}

/// Trimmed domain, rejected locally when empty or lacking a `.`.
pub fn validate_domain(
    raw: &str,
) -> std::result::Result<String, ValidationError> {
    let domain = raw.trim();
    if domain.is_empty() {
        return Err(ValidationError::EmptyDomain);
    }
    if !domain.contains('.') {
        return Err(ValidationError::MalformedDomain(domain.to_string()));
    }
    Ok(domain.to_string())
}

/// One domain per line; blank and dot-less lines are dropped.
pub fn parse_bulk_domains(
    input: &str,
) -> std::result::Result<Vec<String>, ValidationError> {
    let domains: Vec<String> = input
        .lines()
        .map(str::trim)
        .filter(|line| line.contains('.'))
        .map(str::to_string)
        .collect();
    if domains.is_empty() {
        return Err(ValidationError::NoValidDomains);
    }
    Ok(domains)
}

/// Issues create/stop/delete commands. It never changes displayed state
/// itself: every success ends with a refresh request on the event channel.
#[derive(Debug, Clone)]
pub struct LifecycleController {
    api: Arc<dyn ScanApi>,
    prompt: Arc<dyn OperatorPrompt>,
    events: EventSender,
}

impl LifecycleController {
    pub fn new(
        api: Arc<dyn ScanApi>,
        prompt: Arc<dyn OperatorPrompt>,
        events: EventSender,
    ) -> Self {
        Self {
            api,
            prompt,
            events,
        }
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.events.send(event);
    }

    pub async fn create(&self, raw_domain: &str) -> Result<ScanAccepted> {
        let domain = validate_domain(raw_domain)?;
        let accepted = self
            .api
            .create_scan(&CreateScanRequest { domain })
            .await?;
        info!(
            job_id = %accepted.job_id,
            domain = %accepted.domain,
            "scan created"
        );
        self.emit(SyncEvent::RegistryRefreshRequested);
        Ok(accepted)
    }

    pub async fn create_bulk(&self, input: &str) -> Result<BulkScanAccepted> {
        let domains = parse_bulk_domains(input)?;
        let accepted = self
            .api
            .create_bulk_scans(&BulkScanRequest { domains })
            .await?;
        info!(submitted = accepted.total_submitted, "bulk scans created");
        self.emit(SyncEvent::RegistryRefreshRequested);
        Ok(accepted)
    }

    /// Reject locally, then ask the operator.
    async fn authorize(
        &self,
        action: JobAction,
        job: JobRef<'_>,
    ) -> Result<()> {
        if !job.status.allows(action) {
            return Err(ReconError::ActionNotAllowed {
                action,
                status: job.status,
            });
        }
        let request = ConfirmationRequest::new(action, job.job_id, job.domain);
        if !self.prompt.confirm(&request).await {
            info!(job_id = %job.job_id, %action, "declined by operator");
            return Err(ReconError::Declined { action });
        }
        Ok(())
    }

    pub async fn stop(&self, job: JobRef<'_>) -> Result<CommandAck> {
        self.authorize(JobAction::Stop, job).await?;
        let ack = self.api.stop_scan(job.job_id).await?;
        info!(job_id = %job.job_id, "scan stop requested");
        self.emit(SyncEvent::RegistryRefreshRequested);
        self.emit(SyncEvent::DetailRefreshRequested(job.job_id.clone()));
        Ok(ack)
    }

    pub async fn delete(&self, job: JobRef<'_>) -> Result<DeletionReport> {
        self.authorize(JobAction::Delete, job).await?;
        let report = self.api.delete_scan(job.job_id).await?;
        info!(job_id = %job.job_id, "scan deleted");
        self.emit(SyncEvent::JobRemoved(job.job_id.clone()));
        self.emit(SyncEvent::RegistryRefreshRequested);
        Ok(report)
    }

    pub async fn force_delete(
        &self,
        job: JobRef<'_>,
    ) -> Result<DeletionReport> {
        self.authorize(JobAction::ForceDelete, job).await?;
        let report = self.api.force_delete_scan(job.job_id).await?;
        let task_revoked =
            report.deleted_items.as_ref().and_then(|d| d.task_revoked);
        info!(job_id = %job.job_id, ?task_revoked, "scan force deleted");
        self.emit(SyncEvent::JobRemoved(job.job_id.clone()));
        self.emit(SyncEvent::RegistryRefreshRequested);
        Ok(report)
    }
}
