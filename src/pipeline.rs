//! One fetch-filter-dedup-deliver cycle, and the lock that serializes cycles.
//!
//! The durable state (ledger and sample log) lives behind a single async
//! mutex. Holding that mutex *is* running a cycle, so two cycles can never
//! interleave their ledger updates. Scheduled runs wait for the lock; ad-hoc
//! runs use [`Pipeline::try_run`] and are turned away with
//! [`RunOutcome::Busy`] instead of queueing.
//!
//! Other processes sharing the state directory (a `--once` run next to the
//! daemon) are excluded by a [`StateLock`] held for the whole cycle. The
//! ledger is reloaded right after the lock is taken, so a cycle always sees
//! what the previous holder delivered.

use crate::config::Settings;
use crate::delivery::{DeliveryEngine, MessageSink};
use crate::fetch::PageFetcher;
use crate::ledger::Ledger;
use crate::orchestrator::Orchestrator;
use crate::sample_log::SampleLog;
use crate::state_lock::{StateLock, StateLockGuard};
use std::fmt;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Scheduled,
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Trigger::Startup => "startup",
            Trigger::Scheduled => "scheduled",
            Trigger::Manual => "manual",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub collected: usize,
    pub new_items: usize,
    pub delivered: usize,
    pub failed: usize,
    pub deferred: usize,
    pub pruned: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(RunSummary),
    /// Another cycle held the lock.
    Busy,
}

#[derive(Debug)]
pub struct PipelineState {
    pub lock: StateLock,
    pub ledger: Ledger,
    pub samples: SampleLog,
}

impl PipelineState {
    pub fn new(lock: StateLock, ledger: Ledger, samples: SampleLog) -> Self {
        Self { lock, ledger, samples }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let ledger = Ledger::load(settings.ledger_path(), settings.retention());
        let samples = match settings.sample_log_path() {
            Some(path) => SampleLog::load(path, settings.sample_log_size),
            None => SampleLog::disabled(),
        };
        Self::new(StateLock::in_dir(&settings.state_dir), ledger, samples)
    }

    /// Persist both files. Failures are logged; the in-memory state stays
    /// authoritative and the next checkpoint retries the write.
    pub fn checkpoint(&mut self) {
        if let Err(e) = self.ledger.flush() {
            error!(error = %e, "Failed to persist delivery ledger");
        }
        if let Err(e) = self.samples.flush() {
            error!(error = %e, "Failed to persist sample log");
        }
    }
}

pub struct Pipeline<P, B, S> {
    orchestrator: Orchestrator<P, B>,
    delivery: DeliveryEngine<S>,
    state: Mutex<PipelineState>,
}

impl<P, B, S> Pipeline<P, B, S>
where
    P: PageFetcher,
    B: PageFetcher,
    S: MessageSink,
{
    pub fn new(orchestrator: Orchestrator<P, B>, delivery: DeliveryEngine<S>, state: PipelineState) -> Self {
        Self {
            orchestrator,
            delivery,
            state: Mutex::new(state),
        }
    }

    #[cfg(test)]
    pub fn orchestrator(&self) -> &Orchestrator<P, B> {
        &self.orchestrator
    }

    #[cfg(test)]
    pub fn delivery(&self) -> &DeliveryEngine<S> {
        &self.delivery
    }

    /// Run a cycle, waiting for any cycle already in progress here or in
    /// another process. A state lock that cannot be opened skips the cycle.
    pub async fn run(&self, trigger: Trigger, shutdown: &CancellationToken) -> RunSummary {
        let mut state = self.state.lock().await;
        let guard = match state.lock.acquire().await {
            Ok(guard) => guard,
            Err(e) => {
                error!(%trigger, path = %state.lock.path().display(), error = %e, "Cannot take state lock; skipping cycle");
                return RunSummary::default();
            }
        };
        self.run_locked(&mut state, guard, trigger, shutdown).await
    }

    /// Run a cycle only if none is in progress, here or in another process.
    pub async fn try_run(&self, trigger: Trigger, shutdown: &CancellationToken) -> RunOutcome {
        let Ok(mut state) = self.state.try_lock() else {
            info!(%trigger, "A cycle is already running; request rejected");
            return RunOutcome::Busy;
        };
        match state.lock.try_acquire() {
            Ok(Some(guard)) => RunOutcome::Completed(self.run_locked(&mut state, guard, trigger, shutdown).await),
            Ok(None) => {
                info!(%trigger, "Another process is running a cycle; request rejected");
                RunOutcome::Busy
            }
            Err(e) => {
                error!(%trigger, path = %state.lock.path().display(), error = %e, "Cannot take state lock; request rejected");
                RunOutcome::Busy
            }
        }
    }

    #[instrument(level = "info", skip_all, fields(trigger = %trigger))]
    async fn run_locked(
        &self,
        state: &mut PipelineState,
        _guard: StateLockGuard,
        trigger: Trigger,
        shutdown: &CancellationToken,
    ) -> RunSummary {
        let started = Instant::now();
        state.ledger.reload();
        let batch = self.orchestrator.collect(shutdown).await;
        let collected = batch.len();

        for item in &batch {
            state.samples.record(item);
        }

        let fresh: Vec<_> = batch.into_iter().filter(|item| state.ledger.is_new(item)).collect();
        let new_items = fresh.len();
        info!(collected, new_items, "Filtered against ledger");

        let report = if fresh.is_empty() {
            Default::default()
        } else {
            self.delivery.deliver(fresh, &mut state.ledger, shutdown).await
        };

        let pruned = state.ledger.prune();
        state.checkpoint();

        let summary = RunSummary {
            collected,
            new_items,
            delivered: report.delivered(),
            failed: report.failed(),
            deferred: report.deferred,
            pruned,
        };
        info!(
            collected = summary.collected,
            new_items = summary.new_items,
            delivered = summary.delivered,
            failed = summary.failed,
            deferred = summary.deferred,
            ledger = state.ledger.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Cycle finished"
        );
        summary
    }

    /// Wait for any running cycle, then flush state to disk.
    ///
    /// Cycles checkpoint on their own, so only a ledger left dirty by a failed
    /// write needs the state lock here.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if state.ledger.is_dirty() {
            match state.lock.acquire().await {
                Ok(_guard) => {
                    state.ledger.reload();
                    state.checkpoint();
                }
                Err(e) => error!(error = %e, "Cannot take state lock at shutdown"),
            }
        } else {
            state.checkpoint();
        }
        info!(ledger = state.ledger.len(), "State flushed");
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::delivery::MessageTemplate;
    use crate::error::FetchError;
    use crate::ledger::{RetentionPolicy, fingerprint};
    use crate::relevance::RelevanceFilter;
    use crate::testing::{MockFetcher, MockSink, listing, source};
    use std::path::Path;
    use std::time::Duration;
    use tokio::time::{Instant, sleep};

    const TITLE: &str = "IDX: Emiten ABC Bagikan Dividen Interim";

    pub(crate) type TestPipeline = Pipeline<MockFetcher, MockFetcher, MockSink>;

    fn state(dir: &Path) -> PipelineState {
        PipelineState::new(
            StateLock::in_dir(dir),
            Ledger::load(dir.join("ledger.txt"), RetentionPolicy::default()),
            SampleLog::load(dir.join("samples.json"), 10),
        )
    }

    pub(crate) fn pipeline(fetcher: MockFetcher, dir: &Path) -> TestPipeline {
        let orchestrator = Orchestrator::new(
            vec![source("A"), source("B"), source("C")],
            fetcher,
            None,
            RelevanceFilter::default(),
            Duration::from_millis(1500),
        );
        let delivery = DeliveryEngine::new(
            MockSink::new(),
            MessageTemplate::default(),
            Duration::from_millis(1500),
            true,
        );
        Pipeline::new(orchestrator, delivery, state(dir))
    }

    fn scenario_fetcher() -> MockFetcher {
        MockFetcher::new()
            .with_error("A", FetchError::Timeout(Duration::from_secs(10)))
            .with_page("B", listing(&[("/berita/123", TITLE)]))
            .with_page("C", listing(&[("https://c.example/berita/9", TITLE)]))
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_sources_one_timeout_one_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(scenario_fetcher(), dir.path());

        let summary = pipeline.run(Trigger::Manual, &CancellationToken::new()).await;
        assert_eq!(summary.collected, 1);
        assert_eq!(summary.delivered, 1);

        let sent = pipeline.delivery().sink().sent();
        assert_eq!(sent.len(), 1);
        // B precedes C in the registry, so B's relative link wins.
        assert!(sent[0].0.contains("https://b.example/berita/123"));

        let state = pipeline.state.lock().await;
        assert_eq!(state.ledger.len(), 1);
        assert!(state.ledger.contains(&fingerprint(TITLE)));
        drop(state);

        let persisted = std::fs::read_to_string(dir.path().join("ledger.txt")).unwrap();
        assert_eq!(persisted.lines().count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_applied_before_each_following_source() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(scenario_fetcher(), dir.path());
        pipeline.run(Trigger::Manual, &CancellationToken::new()).await;

        let calls = pipeline.orchestrator().primary_fetcher().calls();
        let names: Vec<_> = calls.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["A", "B", "C"]);
        assert!(calls[2].1 - calls[1].1 >= Duration::from_millis(1500));
        assert!(calls[1].1 - calls[0].1 >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_cycle_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(scenario_fetcher(), dir.path());
        let token = CancellationToken::new();

        pipeline.run(Trigger::Startup, &token).await;
        let second = pipeline.run(Trigger::Scheduled, &token).await;
        assert_eq!(second.collected, 1);
        assert_eq!(second.new_items, 0);
        assert_eq!(pipeline.delivery().sink().sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ledger_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        {
            let first = pipeline(scenario_fetcher(), dir.path());
            first.run(Trigger::Startup, &token).await;
            first.shutdown().await;
        }
        let restarted = pipeline(scenario_fetcher(), dir.path());
        let summary = restarted.run(Trigger::Startup, &token).await;
        assert_eq!(summary.new_items, 0);
        assert!(restarted.delivery().sink().sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_run_rejected_while_busy() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(scenario_fetcher(), dir.path());
        let token = CancellationToken::new();

        let held = pipeline.state.lock().await;
        assert_eq!(pipeline.try_run(Trigger::Manual, &token).await, RunOutcome::Busy);
        drop(held);

        assert!(matches!(
            pipeline.try_run(Trigger::Manual, &token).await,
            RunOutcome::Completed(RunSummary { delivered: 1, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_recorded_even_when_already_delivered() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(scenario_fetcher(), dir.path());
        let token = CancellationToken::new();
        pipeline.run(Trigger::Startup, &token).await;
        pipeline.run(Trigger::Scheduled, &token).await;

        let state = pipeline.state.lock().await;
        assert_eq!(state.samples.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_waits_for_in_flight_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(scenario_fetcher(), dir.path());
        let token = CancellationToken::new();
        let start = Instant::now();

        let held = pipeline.state.lock().await;
        let (summary, _) = tokio::join!(pipeline.run(Trigger::Scheduled, &token), async move {
            sleep(Duration::from_secs(5)).await;
            drop(held);
        });

        assert_eq!(summary.delivered, 1);
        let calls = pipeline.orchestrator().primary_fetcher().calls();
        assert!(calls[0].1 - start >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_once_run_next_to_daemon_sends_headline_once() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = pipeline(scenario_fetcher(), dir.path());
        let once = pipeline(scenario_fetcher(), dir.path());
        let token = CancellationToken::new();

        assert!(matches!(
            once.try_run(Trigger::Manual, &token).await,
            RunOutcome::Completed(RunSummary { delivered: 1, .. })
        ));
        let summary = daemon.run(Trigger::Scheduled, &token).await;
        assert_eq!(summary.new_items, 0);
        assert!(daemon.delivery().sink().sent().is_empty());

        daemon.shutdown().await;
        let persisted = std::fs::read_to_string(dir.path().join("ledger.txt")).unwrap();
        assert_eq!(persisted.lines().collect::<Vec<_>>(), [fingerprint(TITLE)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_run_rejected_while_other_process_holds_state() {
        let dir = tempfile::tempdir().unwrap();
        let once = pipeline(scenario_fetcher(), dir.path());
        let other = StateLock::in_dir(dir.path()).try_acquire().unwrap().unwrap();

        assert_eq!(once.try_run(Trigger::Manual, &CancellationToken::new()).await, RunOutcome::Busy);
        assert!(once.orchestrator().primary_fetcher().calls().is_empty());
        drop(other);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_run_waits_for_other_process() {
        let dir = tempfile::tempdir().unwrap();
        let daemon = pipeline(scenario_fetcher(), dir.path());
        let other = StateLock::in_dir(dir.path()).try_acquire().unwrap().unwrap();
        let token = CancellationToken::new();
        let start = Instant::now();

        let (summary, _) = tokio::join!(daemon.run(Trigger::Scheduled, &token), async move {
            sleep(Duration::from_secs(3)).await;
            drop(other);
        });

        assert_eq!(summary.delivered, 1);
        let calls = daemon.orchestrator().primary_fetcher().calls();
        assert!(calls[0].1 - start >= Duration::from_secs(3));
    }
}
