use std::{sync::Arc, time::Duration};

use recon_model::JobId;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use super::heuristic::{
    CompletionHeuristic, CompletionReason, HeuristicSettings, HeuristicStep,
};
use crate::{
    api::ScanApi,
    events::{EventSender, SyncEvent},
};

/// Result shown once a selective scan is considered done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubScanSummary {
    pub task_id: String,
    /// Number of URLs the operator selected, not the server's count.
    pub urls_scanned: usize,
    pub leaks_found: usize,
    pub ticks: u32,
    pub reason: CompletionReason,
}

/// Handle on the background task watching a selective scan.
#[derive(Debug)]
pub struct SubScanMonitor {
    job_id: JobId,
    task_id: String,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<Option<SubScanSummary>>,
}

pub(crate) struct MonitorParams {
    pub job_id: JobId,
    pub task_id: String,
    pub urls_scanned: usize,
    pub poll_interval: Duration,
    pub settings: HeuristicSettings,
}

impl SubScanMonitor {
    pub(crate) fn spawn(
        api: Arc<dyn ScanApi>,
        events: EventSender,
        params: MonitorParams,
    ) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let job_id = params.job_id.clone();
        let task_id = params.task_id.clone();
        info!(
            job_id = %job_id,
            task_id = %task_id,
            "selective scan monitor started"
        );
        let task = tokio::spawn(monitor_loop(api, events, params, stop_rx));
        Self {
            job_id,
            task_id,
            stop_tx,
            task,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn cancel(self) {
        debug!(
            job_id = %self.job_id,
            task_id = %self.task_id,
            "selective scan monitor cancelled"
        );
        let _ = self.stop_tx.send(true);
        self.task.abort();
    }

    /// Wait for the monitor. `None` when it was cancelled.
    pub async fn join(self) -> Option<SubScanSummary> {
        self.task.await.ok().flatten()
    }
}

async fn monitor_loop(
    api: Arc<dyn ScanApi>,
    events: EventSender,
    params: MonitorParams,
    mut stop_rx: watch::Receiver<bool>,
) -> Option<SubScanSummary> {
    let mut heuristic = CompletionHeuristic::new(params.settings);
    let mut ticker = time::interval(params.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    return None;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        let observed = match api.scan_detail(&params.job_id).await {
            Ok(detail) => Some(detail.leak_count()),
            Err(err) => {
                warn!(
                    job_id = %params.job_id,
                    error = %err,
                    "selective scan poll failed"
                );
                None
            }
        };

        if *stop_rx.borrow() {
            return None;
        }

        match heuristic.tick(observed) {
            HeuristicStep::Running { tick, percent } => {
                debug!(
                    job_id = %params.job_id,
                    tick,
                    percent,
                    "selective scan tick"
                );
                let _ = events.send(SyncEvent::SubScanProgress {
                    job_id: params.job_id.clone(),
                    tick,
                    percent,
                });
            }
            HeuristicStep::Complete { tick, reason } => {
                let summary = SubScanSummary {
                    task_id: params.task_id.clone(),
                    urls_scanned: params.urls_scanned,
                    leaks_found: heuristic.leak_count(),
                    ticks: tick,
                    reason,
                };
                info!(
                    job_id = %params.job_id,
                    task_id = %params.task_id,
                    leaks = summary.leaks_found,
                    ?reason,
                    "selective scan considered complete"
                );
                let _ = events.send(SyncEvent::SubScanProgress {
                    job_id: params.job_id.clone(),
                    tick,
                    percent: 100.0,
                });
                let _ = events.send(SyncEvent::SubScanCompleted {
                    job_id: params.job_id.clone(),
                    summary: summary.clone(),
                });
                let refresh =
                    SyncEvent::DetailRefreshRequested(params.job_id.clone());
                let _ = events.send(refresh);
                return Some(summary);
            }
        }
    }
}
