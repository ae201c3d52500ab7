//! The view controller's context object.
//!
//! [`Session`] is the one place client state lives: the last job listing,
//! the open job with its selection and sub-scan monitor, the per-job
//! progress timers and the auto-refresh timer. Components never hold shared
//! mutable state of their own; they report back through [`SyncEvent`]s which
//! the session applies.

use std::{path::{Path, PathBuf}, sync::Arc, time::Duration};

use recon_model::{
    BulkScanAccepted, CommandAck, DeletionReport, JobDetail, JobId, JobLike,
    JobStatus, JobSummary, LeakScanAccepted, LeakScanMode, ScanAccepted,
};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    api::ScanApi,
    augment::{ResultAugmenter, SubdomainDraft},
    config::DashboardConfig,
    error::{ReconError, Result},
    events::{self, EventReceiver, EventSender, SyncEvent},
    export,
    lifecycle::{JobRef, LifecycleController, OperatorPrompt},
    poller::ProgressPoller,
    registry::JobRegistry,
    subscan::{
        SelectionSet, SubScanMonitor, SubScanOrchestrator, SubScanSummary,
    },
};

/// State attached to the job shown in the detail view.
#[derive(Debug)]
pub struct OpenJob {
    detail: JobDetail,
    selection: Option<SelectionSet>,
    monitor: Option<SubScanMonitor>,
    subscan_percent: Option<f64>,
    subscan_summary: Option<SubScanSummary>,
    draft: SubdomainDraft,
    pending_refresh: Option<JoinHandle<()>>,
}

impl OpenJob {
    fn new(detail: JobDetail) -> Self {
        Self {
            detail,
            selection: None,
            monitor: None,
            subscan_percent: None,
            subscan_summary: None,
            draft: SubdomainDraft::default(),
            pending_refresh: None,
        }
    }

    pub fn detail(&self) -> &JobDetail {
        &self.detail
    }

    pub fn selection(&self) -> Option<&SelectionSet> {
        self.selection.as_ref()
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.is_some()
    }

    pub fn subscan_percent(&self) -> Option<f64> {
        self.subscan_percent
    }

    pub fn subscan_summary(&self) -> Option<&SubScanSummary> {
        self.subscan_summary.as_ref()
    }

    pub fn draft(&self) -> &SubdomainDraft {
        &self.draft
    }

    fn teardown(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.cancel();
        }
        if let Some(refresh) = self.pending_refresh.take() {
            refresh.abort();
        }
        self.selection = None;
    }
}

#[derive(Debug)]
struct AutoRefresh {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// A displayed status only ever moves forward along the lifecycle.
fn never_backdate(previous: JobStatus, next: JobStatus) -> JobStatus {
    if next.rank() < previous.rank() {
        debug!(%previous, %next, "ignoring backdated status");
        previous
    } else {
        next
    }
}

#[derive(Debug)]
pub struct Session {
    api: Arc<dyn ScanApi>,
    config: DashboardConfig,
    registry: JobRegistry,
    poller: ProgressPoller,
    lifecycle: LifecycleController,
    subscan: SubScanOrchestrator,
    augmenter: ResultAugmenter,
    events_tx: EventSender,
    events_rx: EventReceiver,
    listing: Vec<JobSummary>,
    open: Option<OpenJob>,
    detail_open: watch::Sender<bool>,
    auto_refresh: Option<AutoRefresh>,
}

impl Session {
    pub fn new(
        api: Arc<dyn ScanApi>,
        prompt: Arc<dyn OperatorPrompt>,
        config: DashboardConfig,
    ) -> Self {
        let (events_tx, events_rx) = events::channel();
        let (detail_open, _) = watch::channel(false);

        Self {
            registry: JobRegistry::new(Arc::clone(&api), config.page_size),
            poller: ProgressPoller::new(
                Arc::clone(&api),
                config.progress_poll_interval(),
                events_tx.clone(),
            ),
            lifecycle: LifecycleController::new(
                Arc::clone(&api),
                prompt,
                events_tx.clone(),
            ),
            subscan: SubScanOrchestrator::new(
                Arc::clone(&api),
                events_tx.clone(),
                &config.leak_scan,
            ),
            augmenter: ResultAugmenter::new(
                Arc::clone(&api),
                events_tx.clone(),
                config.augment_refresh_delay(),
            ),
            api,
            config,
            events_tx,
            events_rx,
            listing: Vec::new(),
            open: None,
            detail_open,
            auto_refresh: None,
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn api(&self) -> &Arc<dyn ScanApi> {
        &self.api
    }

    pub fn listing(&self) -> &[JobSummary] {
        &self.listing
    }

    pub fn open_job(&self) -> Option<&OpenJob> {
        self.open.as_ref()
    }

    pub fn poller(&self) -> &ProgressPoller {
        &self.poller
    }

    pub fn registry_mut(&mut self) -> &mut JobRegistry {
        &mut self.registry
    }

    pub fn default_leak_mode(&self) -> LeakScanMode {
        self.subscan.default_mode()
    }

    fn is_open(&self, job_id: &JobId) -> bool {
        self.open
            .as_ref()
            .is_some_and(|open| &open.detail.job_id == job_id)
    }

    /// Re-read the listing, drop timers for jobs that left it and start one
    /// for every running job that has none.
    pub async fn refresh_registry(&mut self) -> Result<&[JobSummary]> {
        let mut jobs = self.registry.list().await?;
        for job in &mut jobs {
            if let Some(previous) =
                self.listing.iter().find(|prev| prev.job_id == job.job_id)
            {
                job.status = never_backdate(previous.status, job.status);
            }
        }

        self.poller.retain_listed(&jobs);
        for job in jobs.iter().filter(|job| job.status == JobStatus::Running) {
            if !self.poller.is_polling(job.job_id()) {
                self.poller.start(job.job_id());
            }
        }

        self.listing = jobs;
        Ok(&self.listing)
    }

    /// Show a job. Switching jobs drops the previous selection and sub-scan.
    pub async fn open(&mut self, job_id: &JobId) -> Result<&OpenJob> {
        let detail = self.registry.get(job_id).await?;
        if !self.is_open(job_id) {
            self.close();
        }

        // An open job is followed from `pending` on; the listing only picks
        // jobs up once they run.
        if !detail.status.is_terminal() && !self.poller.is_polling(job_id) {
            self.poller.start(job_id);
        }

        match self.open.as_mut() {
            Some(open) => open.detail = detail,
            None => self.open = Some(OpenJob::new(detail)),
        }
        self.detail_open.send_replace(true);
        info!(job_id = %job_id, "job opened");
        self.open.as_ref().ok_or(ReconError::NoJobOpen)
    }

    /// Replace the open job's detail with a fresh snapshot. A job that has
    /// disappeared server-side closes the view.
    pub async fn reload_detail(&mut self) -> Result<Option<&JobDetail>> {
        let Some(job_id) =
            self.open.as_ref().map(|open| open.detail.job_id.clone())
        else {
            return Ok(None);
        };

        match self.registry.get(&job_id).await {
            Ok(mut detail) => {
                if let Some(open) = self.open.as_mut()
                    && open.detail.job_id == job_id
                {
                    detail.status =
                        never_backdate(open.detail.status, detail.status);
                    open.detail = detail;
                }
                Ok(self.open.as_ref().map(OpenJob::detail))
            }
            Err(ReconError::Api(err)) if err.is_not_found() => {
                info!(job_id = %job_id, "open job no longer exists");
                self.close();
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Leave the detail view, cancelling the job's progress timer and any
    /// sub-scan monitor.
    pub fn close(&mut self) {
        if let Some(mut open) = self.open.take() {
            open.teardown();
            self.poller.stop(&open.detail.job_id);
            debug!(job_id = %open.detail.job_id, "job closed");
        }
        self.detail_open.send_replace(false);
    }

    pub fn open_selection(&mut self) -> Result<&mut SelectionSet> {
        let open = self.open.as_mut().ok_or(ReconError::NoJobOpen)?;
        let selection = self.subscan.open(&open.detail)?;
        Ok(open.selection.insert(selection))
    }

    pub fn selection_mut(&mut self) -> Option<&mut SelectionSet> {
        self.open.as_mut()?.selection.as_mut()
    }

    /// Submit the open selection. A running monitor for the job is replaced.
    pub async fn submit_selection(
        &mut self,
        mode: Option<LeakScanMode>,
    ) -> Result<LeakScanAccepted> {
        let open = self.open.as_mut().ok_or(ReconError::NoJobOpen)?;
        let selection = open
            .selection
            .as_ref()
            .ok_or(crate::ValidationError::EmptySelection)?;

        let submitted = self
            .subscan
            .submit(&open.detail.job_id, selection, mode)
            .await?;
        if let Some(previous) = open.monitor.replace(submitted.monitor) {
            previous.cancel();
        }
        open.selection = None;
        open.subscan_percent = Some(0.0);
        open.subscan_summary = None;
        Ok(submitted.accepted)
    }

    pub fn draft_mut(&mut self) -> Option<&mut SubdomainDraft> {
        self.open.as_mut().map(|open| &mut open.draft)
    }

    /// Submit the open job's subdomain draft.
    pub async fn submit_draft(&mut self) -> Result<CommandAck> {
        let open = self.open.as_mut().ok_or(ReconError::NoJobOpen)?;
        let (ack, refresh) = self
            .augmenter
            .submit(&open.detail.job_id, &mut open.draft)
            .await?;
        if let Some(previous) = open.pending_refresh.replace(refresh) {
            previous.abort();
        }
        Ok(ack)
    }

    pub async fn create(&mut self, domain: &str) -> Result<ScanAccepted> {
        let accepted = self.lifecycle.create(domain).await?;
        self.pump_events().await;
        Ok(accepted)
    }

    pub async fn create_bulk(
        &mut self,
        input: &str,
    ) -> Result<BulkScanAccepted> {
        let accepted = self.lifecycle.create_bulk(input).await?;
        self.pump_events().await;
        Ok(accepted)
    }

    /// Domain and last known status, from the open view, the listing, or a
    /// fresh fetch.
    async fn describe(&self, job_id: &JobId) -> Result<(String, JobStatus)> {
        if let Some(open) = self
            .open
            .as_ref()
            .filter(|open| &open.detail.job_id == job_id)
        {
            return Ok((open.detail.domain.clone(), open.detail.status));
        }
        if let Some(job) =
            self.listing.iter().find(|job| &job.job_id == job_id)
        {
            return Ok((job.domain.clone(), job.status));
        }
        let detail = self.registry.get(job_id).await?;
        Ok((detail.domain, detail.status))
    }

    pub async fn stop(&mut self, job_id: &JobId) -> Result<CommandAck> {
        let (domain, status) = self.describe(job_id).await?;
        let ack = self
            .lifecycle
            .stop(JobRef { job_id, domain: &domain, status })
            .await?;
        self.pump_events().await;
        Ok(ack)
    }

    pub async fn delete(&mut self, job_id: &JobId) -> Result<DeletionReport> {
        let (domain, status) = self.describe(job_id).await?;
        let report = self
            .lifecycle
            .delete(JobRef { job_id, domain: &domain, status })
            .await?;
        self.pump_events().await;
        Ok(report)
    }

    pub async fn force_delete(
        &mut self,
        job_id: &JobId,
    ) -> Result<DeletionReport> {
        let (domain, status) = self.describe(job_id).await?;
        let report = self
            .lifecycle
            .force_delete(JobRef { job_id, domain: &domain, status })
            .await?;
        self.pump_events().await;
        Ok(report)
    }

    pub async fn export(&self, job_id: &JobId, dir: &Path) -> Result<PathBuf> {
        export::export_job(self.api.as_ref(), job_id, dir).await
    }

    /// Apply one event. Refresh failures are logged, not returned.
    pub async fn handle_event(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::RegistryRefreshRequested => {
                if let Err(err) = self.refresh_registry().await {
                    warn!(error = %err, "registry refresh failed");
                }
            }
            SyncEvent::DetailRefreshRequested(job_id)
            | SyncEvent::JobFinished { job_id, .. } => {
                if self.is_open(job_id)
                    && let Err(err) = self.reload_detail().await
                {
                    warn!(
                        job_id = %job_id,
                        error = %err,
                        "detail refresh failed"
                    );
                }
            }
            SyncEvent::JobRemoved(job_id) => {
                self.poller.stop(job_id);
                if self.is_open(job_id) {
                    self.close();
                }
                self.listing.retain(|job| &job.job_id != job_id);
            }
            SyncEvent::ProgressUpdated { job_id, .. } => {
                let pending = self.open.as_ref().is_some_and(|open| {
                    &open.detail.job_id == job_id
                        && open.detail.status == JobStatus::Pending
                });
                if pending && let Err(err) = self.reload_detail().await {
                    warn!(
                        job_id = %job_id,
                        error = %err,
                        "detail refresh failed"
                    );
                }
            }
            SyncEvent::SubScanProgress { job_id, percent, .. } => {
                if let Some(open) = self.open.as_mut()
                    && &open.detail.job_id == job_id
                {
                    open.subscan_percent = Some(*percent);
                }
            }
            SyncEvent::SubScanCompleted { job_id, summary } => {
                if let Some(open) = self.open.as_mut()
                    && &open.detail.job_id == job_id
                {
                    open.monitor = None;
                    open.subscan_percent = Some(100.0);
                    open.subscan_summary = Some(summary.clone());
                }
            }
        }
    }

    /// Apply every queued event. Registry refreshes are coalesced into one,
    /// run after the rest.
    pub async fn pump_events(&mut self) -> Vec<SyncEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            drained.push(event);
        }

        let mut refresh = false;
        for event in &drained {
            if *event == SyncEvent::RegistryRefreshRequested {
                refresh = true;
            } else {
                self.handle_event(event).await;
            }
        }
        if refresh {
            self.handle_event(&SyncEvent::RegistryRefreshRequested).await;
        }
        drained
    }

    /// Wait for the next event and apply it.
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        let event = self.events_rx.recv().await?;
        self.handle_event(&event).await;
        Some(event)
    }

    /// Periodic listing refresh, paused while a job is open.
    pub fn start_auto_refresh(&mut self) {
        self.stop_auto_refresh();
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(auto_refresh_loop(
            self.config.auto_refresh_interval(),
            self.events_tx.clone(),
            self.detail_open.subscribe(),
            stop_rx,
        ));
        self.auto_refresh = Some(AutoRefresh { stop_tx, task });
    }

    pub fn stop_auto_refresh(&mut self) {
        if let Some(auto) = self.auto_refresh.take() {
            let _ = auto.stop_tx.send(true);
            auto.task.abort();
        }
    }

    /// Cancel every timer this session owns.
    pub fn shutdown(&mut self) {
        self.stop_auto_refresh();
        self.close();
        self.poller.stop_all();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn auto_refresh_loop(
    interval: Duration,
    events: EventSender,
    detail_open: watch::Receiver<bool>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        if *detail_open.borrow() {
            debug!("auto refresh skipped, job open");
            continue;
        }
        if events.send(SyncEvent::RegistryRefreshRequested).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lifecycle::ConfirmationRequest,
        testing::{StubScanApi, fixtures},
    };
    use async_trait::async_trait;

    #[derive(Debug)]
    struct AlwaysYes;

    #[async_trait]
    impl OperatorPrompt for AlwaysYes {
        async fn confirm(&self, _request: &ConfirmationRequest) -> bool {
            true
        }
    }

    fn session(api: &Arc<StubScanApi>) -> Session {
        Session::new(
            api.clone(),
            Arc::new(AlwaysYes),
            DashboardConfig::default(),
        )
    }

    fn completed_detail(job_id: &str) -> serde_json::Value {
        fixtures::detail_document(
            job_id,
            "example.com",
            "completed",
            &[("a.example.com", true), ("b.example.com", true)],
            &[],
            0,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_polls_running_jobs_and_drops_orphans() {
        let api = Arc::new(StubScanApi::new());
        api.push_listing(vec![
            fixtures::summary("j1", "one.com", "running"),
            fixtures::summary("j2", "two.com", "completed"),
            fixtures::summary("j3", "three.com", "pending"),
        ]);
        api.push_listing(vec![fixtures::summary("j2", "two.com", "completed")]);
        let mut session = session(&api);

        session.refresh_registry().await.unwrap();
        assert_eq!(session.poller().active_jobs(), vec![JobId::new("j1")]);

        session.refresh_registry().await.unwrap();
        assert!(session.poller().active_jobs().is_empty());
        assert_eq!(session.listing().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn open_pending_job_is_followed_until_it_finishes() {
        let api = Arc::new(StubScanApi::new());
        api.push_document(
            "j1",
            fixtures::detail_document(
                "j1",
                "example.com",
                "pending",
                &[],
                &[],
                0,
            ),
        );
        api.push_document(
            "j1",
            fixtures::detail_document(
                "j1",
                "example.com",
                "running",
                &[],
                &[],
                0,
            ),
        );
        api.push_document("j1", completed_detail("j1"));
        api.push_progress("j1", fixtures::progress("pending", None));
        api.push_progress("j1", fixtures::progress("running", Some(40.0)));
        api.push_progress("j1", fixtures::progress("completed", Some(100.0)));
        let mut session = session(&api);
        let job_id = JobId::new("j1");

        session.start_auto_refresh();
        session.open(&job_id).await.unwrap();
        assert!(session.poller().is_polling(&job_id));

        let status = time::timeout(Duration::from_secs(600), async {
            loop {
                match session.next_event().await {
                    Some(SyncEvent::JobFinished { status, .. }) => break status,
                    Some(_) => {}
                    None => panic!("event channel closed"),
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(status, JobStatus::Completed);
        assert_eq!(api.count_calls("scan_progress j1"), 3);
        let detail = session.open_job().unwrap().detail();
        assert_eq!(detail.status, JobStatus::Completed);
        assert_eq!(detail.subdomains.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn listing_never_backdates_a_status() {
        let api = Arc::new(StubScanApi::new());
        api.push_listing(vec![fixtures::summary("j1", "one.com", "running")]);
        api.push_listing(vec![fixtures::summary("j1", "one.com", "pending")]);
        let mut session = session(&api);

        session.refresh_registry().await.unwrap();
        let jobs = session.refresh_registry().await.unwrap();
        assert_eq!(jobs[0].status, JobStatus::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_jobs_clears_selection_and_cancels_monitor() {
        let api = Arc::new(StubScanApi::new());
        api.push_document("j1", completed_detail("j1"));
        api.push_document("j2", completed_detail("j2"));
        let mut session = session(&api);

        session.open(&JobId::new("j1")).await.unwrap();
        session.open_selection().unwrap().select_all();
        session.submit_selection(None).await.unwrap();
        assert!(session.open_job().unwrap().is_monitoring());

        session.open_selection().unwrap().select_all();
        session.open(&JobId::new("j2")).await.unwrap();
        let open = session.open_job().unwrap();
        assert_eq!(open.detail().job_id, JobId::new("j2"));
        assert!(open.selection().is_none());
        assert!(!open.is_monitoring());

        let before = api.count_calls("scan_document j1");
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.count_calls("scan_document j1"), before);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_cancels_the_jobs_timers() {
        let api = Arc::new(StubScanApi::new());
        api.push_document(
            "j1",
            fixtures::detail_document(
                "j1",
                "example.com",
                "running",
                &[],
                &[],
                0,
            ),
        );
        api.push_progress("j1", fixtures::progress("running", Some(12.0)));
        let mut session = session(&api);

        session.open(&JobId::new("j1")).await.unwrap();
        assert!(session.poller().is_polling(&JobId::new("j1")));

        session.close();
        assert!(session.open_job().is_none());
        assert!(!session.poller().is_polling(&JobId::new("j1")));
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(api.count_calls("scan_progress"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_refresh_pauses_while_a_job_is_open() {
        let api = Arc::new(StubScanApi::new());
        api.push_document("j1", completed_detail("j1"));
        let mut session = session(&api);
        session.start_auto_refresh();

        time::sleep(Duration::from_millis(10_500)).await;
        session.pump_events().await;
        assert_eq!(api.count_calls("list_scans"), 1);

        session.open(&JobId::new("j1")).await.unwrap();
        time::sleep(Duration::from_secs(30)).await;
        session.pump_events().await;
        assert_eq!(api.count_calls("list_scans"), 1);

        session.close();
        time::sleep(Duration::from_secs(10)).await;
        session.pump_events().await;
        assert_eq!(api.count_calls("list_scans"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn deleting_the_open_job_closes_it() {
        let api = Arc::new(StubScanApi::new());
        api.push_document("j1", completed_detail("j1"));
        let mut session = session(&api);

        session.open(&JobId::new("j1")).await.unwrap();
        session.delete(&JobId::new("j1")).await.unwrap();

        assert!(session.open_job().is_none());
        assert_eq!(api.count_calls("delete_scan j1"), 1);
        assert_eq!(api.count_calls("list_scans"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn subscan_completion_lands_on_the_open_job() {
        let api = Arc::new(StubScanApi::new());
        api.push_document("j1", completed_detail("j1"));
        let mut session = session(&api);

        session.open(&JobId::new("j1")).await.unwrap();
        session
            .open_selection()
            .unwrap()
            .select("https://a.example.com")
            .unwrap();
        let accepted = session
            .submit_selection(Some(LeakScanMode::Full))
            .await
            .unwrap();
        assert_eq!(accepted.urls_to_scan, 1);
        assert!(session.open_job().unwrap().selection().is_none());

        api.push_document(
            "j1",
            fixtures::detail_document(
                "j1",
                "example.com",
                "completed",
                &[("a.example.com", true)],
                &[],
                2,
            ),
        );
        time::sleep(Duration::from_secs(21)).await;
        session.pump_events().await;

        let open = session.open_job().unwrap();
        let summary = open.subscan_summary().unwrap();
        assert_eq!(summary.urls_scanned, 1);
        assert_eq!(summary.leaks_found, 2);
        assert_eq!(open.subscan_percent(), Some(100.0));
        assert!(!open.is_monitoring());
        assert_eq!(open.detail().leak_count(), 2);
    }
}
