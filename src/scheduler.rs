//! Periodic execution and process signals.
//!
//! The first cycle runs after a short startup delay, then one per poll
//! interval. A late tick is delayed rather than bunched up, so a slow cycle
//! never causes back-to-back runs. Manual triggers (SIGUSR1 on Unix) run a
//! cycle immediately when idle; a trigger that arrives while a cycle is
//! running is rejected as busy once that cycle ends.

use crate::delivery::MessageSink;
use crate::fetch::PageFetcher;
use crate::pipeline::{Pipeline, RunOutcome, Trigger};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Sends manual run requests to a [`Scheduler`].
#[derive(Debug, Clone)]
pub struct ManualTrigger {
    tx: mpsc::Sender<()>,
}

impl ManualTrigger {
    /// Request a run. Returns `false` when a request is already pending.
    pub fn fire(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}

pub fn manual_trigger() -> (ManualTrigger, mpsc::Receiver<()>) {
    let (tx, rx) = mpsc::channel(1);
    (ManualTrigger { tx }, rx)
}

#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    pub interval: Duration,
    pub startup_delay: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration, startup_delay: Duration) -> Self {
        Self { interval, startup_delay }
    }

    /// Run cycles until `shutdown` is cancelled.
    pub async fn run<P, B, S>(
        &self,
        pipeline: &Pipeline<P, B, S>,
        shutdown: CancellationToken,
        mut manual: mpsc::Receiver<()>,
    ) where
        P: PageFetcher,
        B: PageFetcher,
        S: MessageSink,
    {
        let mut ticker = interval_at(Instant::now() + self.startup_delay, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut first = true;

        info!(
            interval_secs = self.interval.as_secs(),
            startup_delay_secs = self.startup_delay.as_secs(),
            "Scheduler started"
        );

        loop {
            let trigger = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if std::mem::take(&mut first) { Trigger::Startup } else { Trigger::Scheduled }
                }
                Some(()) = manual.recv() => Trigger::Manual,
            };

            match trigger {
                Trigger::Manual => {
                    if pipeline.try_run(trigger, &shutdown).await == RunOutcome::Busy {
                        warn!("Manual run rejected: a cycle is in progress");
                    }
                }
                _ => {
                    pipeline.run(trigger, &shutdown).await;
                }
            }

            while manual.try_recv().is_ok() {
                warn!("Manual run rejected: it arrived while a cycle was in progress");
            }
        }
        info!("Scheduler stopped");
    }
}

/// Resolve on Ctrl-C, or SIGTERM on Unix.
pub async fn wait_for_termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C"),
                    _ = term.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Could not install SIGTERM handler; listening for Ctrl-C only");
                let _ = tokio::signal::ctrl_c().await;
                info!("Received Ctrl-C");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl-C");
    }
}

/// Fire `trigger` on every SIGUSR1 until `shutdown` is cancelled.
#[cfg(unix)]
pub async fn forward_user_signal(trigger: ManualTrigger, shutdown: CancellationToken) {
    use tokio::signal::unix::{SignalKind, signal};
    let mut usr1 = match signal(SignalKind::user_defined1()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "Could not install SIGUSR1 handler; manual runs disabled");
            return;
        }
    };
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            received = usr1.recv() => {
                if received.is_none() {
                    return;
                }
                if trigger.fire() {
                    info!("SIGUSR1: manual run requested");
                } else {
                    info!("SIGUSR1: a manual run is already pending");
                }
            }
        }
    }
}
