//! Selective leak scans over a completed job's live, non-WAF hosts.

pub mod candidates;
pub mod heuristic;
pub mod monitor;

use std::{sync::Arc, time::Duration};

use recon_model::{
    JobDetail, JobId, JobStatus, LeakScanAccepted, LeakScanMode,
    LeakScanRequest,
};
use tracing::info;

pub use candidates::{Candidate, SelectionSet, derive_candidates};
pub use heuristic::{
    CompletionHeuristic, CompletionReason, HeuristicSettings, HeuristicStep,
    display_percent,
};
pub use monitor::{SubScanMonitor, SubScanSummary};

use crate::{
    api::ScanApi,
    config::LeakScanConfig,
    error::{ReconError, Result, ValidationError},
    events::EventSender,
};
use monitor::MonitorParams;

/// Accepted selective scan plus the monitor watching it.
#[derive(Debug)]
pub struct SubmittedSubScan {
    /// Server acknowledgement, displayed as-is.
    pub accepted: LeakScanAccepted,
    pub monitor: SubScanMonitor,
}

#[derive(Debug, Clone)]
pub struct SubScanOrchestrator {
    api: Arc<dyn ScanApi>,
    events: EventSender,
    poll_interval: Duration,
    settings: HeuristicSettings,
    default_mode: LeakScanMode,
}

impl SubScanOrchestrator {
    pub fn new(
        api: Arc<dyn ScanApi>,
        events: EventSender,
        config: &LeakScanConfig,
    ) -> Self {
        Self {
            api,
            events,
            poll_interval: config.poll_interval(),
            settings: HeuristicSettings::from(config),
            default_mode: config.default_mode,
        }
    }

    pub fn default_mode(&self) -> LeakScanMode {
        self.default_mode
    }

    /// Candidate selection for a completed job; nothing pre-selected.
    pub fn open(&self, detail: &JobDetail) -> Result<SelectionSet> {
        if detail.status != JobStatus::Completed {
            return Err(ReconError::NotCompleted(detail.status));
        }
        Ok(SelectionSet::new(derive_candidates(detail)?))
    }

    /// Submit the selection and start watching for completion.
    pub async fn submit(
        &self,
        job_id: &JobId,
        selection: &SelectionSet,
        mode: Option<LeakScanMode>,
    ) -> Result<SubmittedSubScan> {
        if selection.is_empty() {
            return Err(ValidationError::EmptySelection.into());
        }

        let request = LeakScanRequest {
            urls: selection.selected_urls(),
            mode: mode.unwrap_or(self.default_mode),
        };
        let accepted = self.api.start_leak_scan(job_id, &request).await?;
        info!(
            job_id = %job_id,
            task_id = %accepted.task_id,
            urls = request.urls.len(),
            mode = %request.mode,
            "selective scan submitted"
        );

        let monitor = SubScanMonitor::spawn(
            Arc::clone(&self.api),
            self.events.clone(),
            MonitorParams {
                job_id: job_id.clone(),
                task_id: accepted.task_id.clone(),
                urls_scanned: request.urls.len(),
                poll_interval: self.poll_interval,
                settings: self.settings,
            },
        );
        Ok(SubmittedSubScan { accepted, monitor })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::{self, SyncEvent},
        testing::{StubScanApi, fixtures},
    };
    use tokio::time;

    fn orchestrator(
        api: &Arc<StubScanApi>,
    ) -> (SubScanOrchestrator, crate::events::EventReceiver) {
        let (tx, rx) = events::channel();
        let config = LeakScanConfig {
            max_ticks: 30,
            ..LeakScanConfig::default()
        };
        (SubScanOrchestrator::new(api.clone(), tx, &config), rx)
    }

    fn completed(leaks: usize) -> serde_json::Value {
        fixtures::detail_document(
            "j1",
            "example.com",
            "completed",
            &[("a.example.com", true), ("b.example.com", true)],
            &[("https://a.example.com", true)],
            leaks,
        )
    }

    #[test]
    fn open_requires_a_completed_job() {
        let api = Arc::new(StubScanApi::new());
        let (orch, _rx) = orchestrator(&api);
        let running: JobDetail =
            serde_json::from_value(fixtures::detail_document(
                "j1",
                "example.com",
                "running",
                &[("a.example.com", true)],
                &[],
                0,
            ))
            .unwrap();

        assert!(matches!(
            orch.open(&running),
            Err(ReconError::NotCompleted(JobStatus::Running))
        ));
    }

    #[tokio::test]
    async fn empty_selection_never_reaches_the_server() {
        let api = Arc::new(StubScanApi::new());
        let (orch, _rx) = orchestrator(&api);
        let detail: JobDetail = serde_json::from_value(completed(0)).unwrap();
        let selection = orch.open(&detail).unwrap();

        let err = orch
            .submit(&JobId::new("j1"), &selection, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconError::Validation(ValidationError::EmptySelection)
        ));
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn leaks_after_minimum_complete_the_scan() {
        let api = Arc::new(StubScanApi::new());
        let (orch, mut rx) = orchestrator(&api);
        let detail: JobDetail = serde_json::from_value(completed(0)).unwrap();
        let mut selection = orch.open(&detail).unwrap();
        selection.select_all();

        for _ in 0..11 {
            api.push_document("j1", completed(0));
        }
        api.push_document("j1", completed(3));

        let submitted = orch
            .submit(&JobId::new("j1"), &selection, Some(LeakScanMode::Full))
            .await
            .unwrap();
        assert_eq!(submitted.accepted.urls_to_scan, 1);
        assert_eq!(submitted.accepted.mode, "full");
        assert_eq!(
            api.calls(),
            ["start_leak_scan j1 full https://b.example.com"]
        );

        let summary = submitted.monitor.join().await.unwrap();
        assert_eq!(summary.ticks, 12);
        assert_eq!(summary.leaks_found, 3);
        assert_eq!(summary.urls_scanned, 1);
        assert_eq!(summary.reason, CompletionReason::LeaksFound);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(events.contains(&SyncEvent::SubScanProgress {
            job_id: JobId::new("j1"),
            tick: 12,
            percent: 100.0,
        }));
        assert_eq!(
            events.last(),
            Some(&SyncEvent::DetailRefreshRequested(JobId::new("j1")))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn budget_exhaustion_completes_without_leaks() {
        let api = Arc::new(StubScanApi::new());
        let (orch, _rx) = orchestrator(&api);
        let detail: JobDetail = serde_json::from_value(completed(0)).unwrap();
        let mut selection = orch.open(&detail).unwrap();
        selection.select("https://b.example.com").unwrap();
        api.push_document("j1", completed(0));

        let submitted = orch
            .submit(&JobId::new("j1"), &selection, None)
            .await
            .unwrap();
        let summary = submitted.monitor.join().await.unwrap();

        assert_eq!(summary.ticks, 30);
        assert_eq!(summary.leaks_found, 0);
        assert_eq!(summary.reason, CompletionReason::BudgetExhausted);
        assert!(api.calls()[0].starts_with("start_leak_scan j1 tiny"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_monitor_stops_polling() {
        let api = Arc::new(StubScanApi::new());
        let (orch, _rx) = orchestrator(&api);
        let detail: JobDetail = serde_json::from_value(completed(0)).unwrap();
        let mut selection = orch.open(&detail).unwrap();
        selection.select_all();
        api.push_document("j1", completed(0));

        let submitted = orch
            .submit(&JobId::new("j1"), &selection, None)
            .await
            .unwrap();
        time::sleep(std::time::Duration::from_millis(4_500)).await;
        submitted.monitor.cancel();
        let polls = api.count_calls("scan_document");
        assert_eq!(polls, 2);

        time::sleep(std::time::Duration::from_secs(20)).await;
        assert_eq!(api.count_calls("scan_document"), polls);
    }
}
