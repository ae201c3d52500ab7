use std::{sync::Arc, time::Duration};

use recon_model::{AddSubdomainRequest, CommandAck, JobId};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::{
    api::ScanApi,
    error::{Result, ValidationError},
    events::{EventSender, SyncEvent},
};

/// Tri-state liveness override for a manually added subdomain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Liveness {
    #[default]
    Unspecified,
    Live,
    Dead,
}

impl Liveness {
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Liveness::Unspecified => None,
            Liveness::Live => Some(true),
            Liveness::Dead => Some(false),
        }
    }
}

impl From<Option<bool>> for Liveness {
    fn from(flag: Option<bool>) -> Self {
        match flag {
            None => Liveness::Unspecified,
            Some(true) => Liveness::Live,
            Some(false) => Liveness::Dead,
        }
    }
}

/// Operator input for a manual subdomain. Survives a failed submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubdomainDraft {
    pub hostname: String,
    pub liveness: Liveness,
    pub http_status: Option<u16>,
}

impl SubdomainDraft {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Self::default()
        }
    }

    pub fn with_liveness(mut self, liveness: Liveness) -> Self {
        self.liveness = liveness;
        self
    }

    pub fn with_http_status(mut self, status: Option<u16>) -> Self {
        self.http_status = status;
        self
    }

    /// Only the fields the operator set end up in the body.
    pub fn to_request(
        &self,
    ) -> std::result::Result<AddSubdomainRequest, ValidationError> {
        let subdomain = self.hostname.trim();
        if subdomain.is_empty() {
            return Err(ValidationError::EmptySubdomain);
        }
        Ok(AddSubdomainRequest {
            subdomain: subdomain.to_string(),
            is_live: self.liveness.as_flag(),
            http_status: self.http_status,
        })
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Appends operator-supplied subdomains to a job.
#[derive(Debug, Clone)]
pub struct ResultAugmenter {
    api: Arc<dyn ScanApi>,
    events: EventSender,
    refresh_delay: Duration,
}

impl ResultAugmenter {
    pub fn new(
        api: Arc<dyn ScanApi>,
        events: EventSender,
        refresh_delay: Duration,
    ) -> Self {
        Self {
            api,
            events,
            refresh_delay,
        }
    }

    /// On success the draft is cleared and a detail refresh is requested
    /// after the display delay; the returned handle owns that timer. On
    /// failure the draft is left as the operator typed it.
    pub async fn submit(
        &self,
        job_id: &JobId,
        draft: &mut SubdomainDraft,
    ) -> Result<(CommandAck, JoinHandle<()>)> {
        let request = draft.to_request()?;
        let ack = match self.api.add_subdomain(job_id, &request).await {
            Ok(ack) => ack,
            Err(err) => {
                warn!(
                    job_id = %job_id,
                    subdomain = %request.subdomain,
                    error = %err,
                    "manual subdomain rejected"
                );
                return Err(err.into());
            }
        };
        info!(
            job_id = %job_id,
            subdomain = %request.subdomain,
            "manual subdomain added"
        );
        draft.clear();

        let events = self.events.clone();
        let delay = self.refresh_delay;
        let job_id = job_id.clone();
        let refresh = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(SyncEvent::DetailRefreshRequested(job_id));
        });
        Ok((ack, refresh))
    }
}
