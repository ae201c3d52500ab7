use std::{collections::HashMap, sync::Arc, time::Duration};

use parking_lot::Mutex;
use recon_model::{JobId, JobLike, JobSummary};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    api::ScanApi,
    events::{EventSender, SyncEvent},
};

#[derive(Debug)]
struct PollLoop {
    generation: u64,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollLoop {
    fn cancel(self) {
        let _ = self.stop_tx.send(true);
        self.task.abort();
    }
}

#[derive(Debug, Default)]
struct PollerState {
    loops: HashMap<JobId, PollLoop>,
    percents: HashMap<JobId, f64>,
    next_generation: u64,
}

/// One progress loop per pending or running job.
///
/// Starting a loop for a job that already has one replaces it, so a job id
/// never has two timers. A loop ends itself when the job reaches a terminal
/// status and asks for a registry refresh on the way out.
#[derive(Debug)]
pub struct ProgressPoller {
    api: Arc<dyn ScanApi>,
    interval: Duration,
    events: EventSender,
    state: Arc<Mutex<PollerState>>,
}

impl ProgressPoller {
    pub fn new(
        api: Arc<dyn ScanApi>,
        interval: Duration,
        events: EventSender,
    ) -> Self {
        Self {
            api,
            interval,
            events,
            state: Arc::new(Mutex::new(PollerState::default())),
        }
    }

    pub fn start(&self, job_id: &JobId) {
        let mut state = self.state.lock();
        state.next_generation += 1;
        let generation = state.next_generation;

        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(progress_loop(
            LoopContext {
                job_id: job_id.clone(),
                generation,
                api: Arc::clone(&self.api),
                interval: self.interval,
                events: self.events.clone(),
                state: Arc::clone(&self.state),
            },
            stop_rx,
        ));

        let replaced = state.loops.insert(
            job_id.clone(),
            PollLoop {
                generation,
                stop_tx,
                task,
            },
        );
        if let Some(previous) = replaced {
            debug!(
                job_id = %job_id,
                generation = previous.generation,
                "replacing progress loop"
            );
            previous.cancel();
        }
        info!(job_id = %job_id, generation, "progress polling started");
    }

    /// Returns whether a loop was running.
    pub fn stop(&self, job_id: &JobId) -> bool {
        let removed = self.state.lock().loops.remove(job_id);
        match removed {
            Some(poll) => {
                poll.cancel();
                info!(job_id = %job_id, "progress polling stopped");
                true
            }
            None => false,
        }
    }

    /// Stop loops for jobs that are missing from `listing` or listed as
    /// terminal. Returns the stopped ids.
    pub fn retain_listed(&self, listing: &[JobSummary]) -> Vec<JobId> {
        let mut state = self.state.lock();
        let stale: Vec<JobId> = state
            .loops
            .keys()
            .filter(|job_id| {
                !listing
                    .iter()
                    .any(|job| job.job_id() == *job_id && !job.is_terminal())
            })
            .cloned()
            .collect();

        for job_id in &stale {
            if let Some(poll) = state.loops.remove(job_id) {
                poll.cancel();
            }
            state.percents.remove(job_id);
            debug!(job_id = %job_id, "dropped orphaned progress loop");
        }
        stale
    }

    pub fn stop_all(&self) {
        let drained: Vec<_> = self.state.lock().loops.drain().collect();
        for (_, poll) in drained {
            poll.cancel();
        }
    }

    pub fn is_polling(&self, job_id: &JobId) -> bool {
        self.state.lock().loops.contains_key(job_id)
    }

    pub fn active_jobs(&self) -> Vec<JobId> {
        let mut jobs: Vec<_> =
            self.state.lock().loops.keys().cloned().collect();
        jobs.sort();
        jobs
    }

    /// Last percentage reported for the job, if any.
    pub fn percent(&self, job_id: &JobId) -> Option<f64> {
        self.state.lock().percents.get(job_id).copied()
    }
}

impl Drop for ProgressPoller {
    fn drop(&mut self) {
        self.stop_all();
    }
}

struct LoopContext {
    job_id: JobId,
    generation: u64,
    api: Arc<dyn ScanApi>,
    interval: Duration,
    events: EventSender,
    state: Arc<Mutex<PollerState>>,
}

impl LoopContext {
    /// Drop this loop's entry unless it has already been replaced.
    fn retire(&self) {
        let mut state = self.state.lock();
        if state
            .loops
            .get(&self.job_id)
            .is_some_and(|poll| poll.generation == self.generation)
        {
            state.loops.remove(&self.job_id);
        }
    }
}

async fn progress_loop(ctx: LoopContext, mut stop_rx: watch::Receiver<bool>) {
    let mut ticker = time::interval(ctx.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; polls start one interval out.
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

        let snapshot = match ctx.api.scan_progress(&ctx.job_id).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(
                    job_id = %ctx.job_id,
                    error = %err,
                    "progress poll failed"
                );
                continue;
            }
        };

        if *stop_rx.borrow() {
            break;
        }

        if let Some(percent) = snapshot.percent() {
            ctx.state
                .lock()
                .percents
                .insert(ctx.job_id.clone(), percent);
            let _ = ctx.events.send(SyncEvent::ProgressUpdated {
                job_id: ctx.job_id.clone(),
                percent,
            });
        }

        match snapshot.status() {
            Ok(status) if status.is_terminal() => {
                info!(
                    job_id = %ctx.job_id,
                    %status,
                    "job reached terminal status"
                );
                ctx.retire();
                let _ = ctx.events.send(SyncEvent::JobFinished {
                    job_id: ctx.job_id.clone(),
                    status,
                });
                let _ = ctx.events.send(SyncEvent::RegistryRefreshRequested);
                break;
            }
            Ok(status) => {
                debug!(job_id = %ctx.job_id, %status, "progress tick");
            }
            Err(unknown) => {
                debug!(
                    job_id = %ctx.job_id,
                    error = %unknown,
                    "non-terminal worker state"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::{self, EventReceiver},
        testing::{StubFailure, StubScanApi, fixtures},
    };
    use recon_model::JobStatus;

    const TICK: Duration = Duration::from_secs(2);

    fn drain(rx: &mut EventReceiver) -> Vec<SyncEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    fn poller(api: &Arc<StubScanApi>) -> (ProgressPoller, EventReceiver) {
        let (tx, rx) = events::channel();
        (ProgressPoller::new(api.clone(), TICK, tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn loop_reports_progress_and_retires_on_completion() {
        let api = Arc::new(StubScanApi::new());
        let job = JobId::new("j1");
        api.push_progress("j1", fixtures::progress("running", Some(10.0)));
        api.push_progress("j1", fixtures::progress("running", Some(50.0)));
        api.push_progress("j1", fixtures::progress("completed", Some(100.0)));
        let (poller, mut rx) = poller(&api);

        poller.start(&job);
        time::sleep(Duration::from_secs(7)).await;

        assert!(!poller.is_polling(&job));
        assert_eq!(poller.percent(&job), Some(100.0));
        let progress = |percent| SyncEvent::ProgressUpdated {
            job_id: job.clone(),
            percent,
        };
        assert_eq!(
            drain(&mut rx),
            vec![
                progress(10.0),
                progress(50.0),
                progress(100.0),
                SyncEvent::JobFinished {
                    job_id: job.clone(),
                    status: JobStatus::Completed,
                },
                SyncEvent::RegistryRefreshRequested,
            ]
        );

        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(api.count_calls("scan_progress"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_a_job_leaves_one_timer() {
        let api = Arc::new(StubScanApi::new());
        let job = JobId::new("j1");
        api.push_progress("j1", fixtures::progress("running", Some(5.0)));
        let (poller, _rx) = poller(&api);

        poller.start(&job);
        poller.start(&job);
        poller.start(&job);
        assert_eq!(poller.active_jobs(), vec![job.clone()]);

        time::sleep(Duration::from_millis(2_100)).await;
        assert_eq!(api.count_calls("scan_progress"), 1);

        time::sleep(TICK).await;
        assert_eq!(api.count_calls("scan_progress"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_do_not_stop_the_loop() {
        let api = Arc::new(StubScanApi::new());
        let job = JobId::new("j1");
        api.push_progress_failure(
            "j1",
            StubFailure::new(502, "worker unavailable"),
        );
        api.push_progress("j1", fixtures::progress("retrying", None));
        api.push_progress("j1", fixtures::progress("running", Some(30.0)));
        api.push_progress("j1", fixtures::progress("failed", None));
        let (poller, mut rx) = poller(&api);

        poller.start(&job);
        time::sleep(Duration::from_secs(5)).await;
        assert!(poller.is_polling(&job));

        time::sleep(Duration::from_secs(4)).await;
        assert!(!poller.is_polling(&job));
        let events = drain(&mut rx);
        assert!(events.contains(&SyncEvent::ProgressUpdated {
            job_id: job.clone(),
            percent: 30.0,
        }));
        assert!(events.contains(&SyncEvent::JobFinished {
            job_id: job.clone(),
            status: JobStatus::Failed,
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn unlisted_and_terminal_jobs_lose_their_loops() {
        let api = Arc::new(StubScanApi::new());
        for id in ["a", "b", "c"] {
            api.push_progress(id, fixtures::progress("running", Some(1.0)));
        }
        let (poller, _rx) = poller(&api);
        for id in ["a", "b", "c"] {
            poller.start(&JobId::new(id));
        }

        let stopped = poller.retain_listed(&[
            fixtures::summary("a", "a.example.com", "running"),
            fixtures::summary("b", "b.example.com", "cancelled"),
        ]);

        assert_eq!(stopped.len(), 2);
        assert_eq!(poller.active_jobs(), vec![JobId::new("a")]);

        time::sleep(Duration::from_millis(2_100)).await;
        assert_eq!(api.calls(), ["scan_progress a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_stop_cancels_before_next_tick() {
        let api = Arc::new(StubScanApi::new());
        let job = JobId::new("j1");
        api.push_progress("j1", fixtures::progress("running", Some(1.0)));
        let (poller, _rx) = poller(&api);

        poller.start(&job);
        assert!(poller.stop(&job));
        assert!(!poller.stop(&job));

        time::sleep(Duration::from_secs(6)).await;
        assert_eq!(api.count_calls("scan_progress"), 0);
    }
}
