//! The watcher - persistent supervisor for monitor execution.
//!
//! One long-running task drives the whole engine: on each tick it polls the
//! store for monitors whose wait period has elapsed, marks them as run,
//! admits them through the bounded FIFO, and fans script runners out onto
//! their own tasks. Between ticks it drains completed envelopes into the
//! store and forwards failures to the diagnostics channel.
//!
//! Nothing here is fatal to the engine: every failure becomes a
//! [`Diagnostic`] and the loop keeps ticking. Only cancellation stops it,
//! after which in-flight runners get a bounded grace period to deliver
//! before the channels close.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::monitor::Monitor;
use crate::report::{NewReport, ReportEnvelope};
use crate::runner::{run_monitor_script, CompletedRun, FailedRun};
use crate::store::MonitorStore;
use crate::types::{Error, MonitorId, WatcherConfig};

pub mod queue;

pub use queue::MonitorQueue;

/// Buffer for the diagnostics channel; overflow is dropped with a log line
/// rather than stalling the supervisor.
const DIAGNOSTICS_BUFFER: usize = 64;

/// Buffer for the runner result and error channels.
const RUNNER_CHANNEL_BUFFER: usize = 64;

/// A non-fatal failure surfaced to the external diagnostics collector.
#[derive(Debug)]
pub struct Diagnostic {
    /// The monitor the failure belongs to, when there is one.
    pub monitor: Option<MonitorId>,
    pub error: Error,
    pub at: DateTime<Utc>,
}

impl Diagnostic {
    fn new(monitor: Option<MonitorId>, error: Error) -> Self {
        Self {
            monitor,
            error,
            at: Utc::now(),
        }
    }
}

/// Supervisor handle. Construction hands back the diagnostics stream;
/// [`Watcher::start`] spawns the loop.
pub struct Watcher {
    store: Arc<dyn MonitorStore>,
    config: WatcherConfig,
    cancel: CancellationToken,
    diagnostics: mpsc::Sender<Diagnostic>,
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Watcher {
    pub fn new(
        store: Arc<dyn MonitorStore>,
        config: WatcherConfig,
    ) -> (Self, mpsc::Receiver<Diagnostic>) {
        let (diagnostics, receiver) = mpsc::channel(DIAGNOSTICS_BUFFER);
        (
            Self {
                store,
                config,
                cancel: CancellationToken::new(),
                diagnostics,
            },
            receiver,
        )
    }

    /// Token observed by the supervisor; clone it to tie the watcher into a
    /// wider shutdown tree.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Request graceful shutdown. Idempotent; any number of callers and
    /// observers may share the token.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Spawn the supervisor loop.
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let supervisor = Supervisor {
            store: self.store.clone(),
            config: self.config.clone(),
            cancel: self.cancel.clone(),
            diagnostics: self.diagnostics.clone(),
        };
        tokio::spawn(supervisor.run())
    }
}

/// Loop state owned by the spawned supervisor task.
struct Supervisor {
    store: Arc<dyn MonitorStore>,
    config: WatcherConfig,
    cancel: CancellationToken,
    diagnostics: mpsc::Sender<Diagnostic>,
}

impl Supervisor {
    async fn run(self) {
        let mut ticker = interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let (result_tx, mut result_rx) = mpsc::channel::<CompletedRun>(RUNNER_CHANNEL_BUFFER);
        let (error_tx, mut error_rx) = mpsc::channel::<FailedRun>(RUNNER_CHANNEL_BUFFER);
        let mut queue = MonitorQueue::new(self.config.queue_capacity);
        let mut running: usize = 0;

        tracing::info!(
            "watcher_started: tick_interval={:?}, ready_limit={}, queue_capacity={}",
            self.config.tick_interval,
            self.config.ready_limit,
            self.config.queue_capacity,
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("watcher_shutdown_requested: in_flight={}", running);
                    break;
                }
                _ = ticker.tick() => {
                    self.tick(&mut queue, &mut running, &result_tx, &error_tx).await;
                }
                Some(done) = result_rx.recv() => {
                    running = running.saturating_sub(1);
                    self.persist(done).await;
                    self.pump(&mut queue, &mut running, &result_tx, &error_tx).await;
                }
                Some(failed) = error_rx.recv() => {
                    running = running.saturating_sub(1);
                    self.surface(Diagnostic::new(Some(failed.monitor_id), failed.error));
                    self.pump(&mut queue, &mut running, &result_tx, &error_tx).await;
                }
            }
        }

        self.drain(running, &mut result_rx, &mut error_rx).await;
        tracing::info!("watcher_stopped");
        // The runner channels and the diagnostics sender drop here, last.
    }

    /// One pass: poll, admit, dispatch.
    async fn tick(
        &self,
        queue: &mut MonitorQueue,
        running: &mut usize,
        result_tx: &mpsc::Sender<CompletedRun>,
        error_tx: &mpsc::Sender<FailedRun>,
    ) {
        let ready = match self.store.list_ready(self.config.ready_limit).await {
            Ok(ready) => ready,
            Err(err) => {
                // Tick skipped; the next one re-polls.
                self.surface(Diagnostic::new(None, err));
                return;
            }
        };

        for monitor in ready {
            if self.config.queue_capacity == 0 {
                // No admission control: touch and spawn directly.
                self.touch(&monitor).await;
                self.dispatch(monitor, running, result_tx, error_tx).await;
            } else {
                let id = monitor.id;
                match queue.push(monitor.clone()) {
                    Ok(()) => self.touch(&monitor).await,
                    // Not an error for the monitor: it was never touched, so
                    // the next tick selects it again.
                    Err(err) => self.surface(Diagnostic::new(Some(id), err)),
                }
            }
        }

        self.pump(queue, running, result_tx, error_tx).await;
    }

    /// Start runners from the queue while in-flight capacity allows.
    async fn pump(
        &self,
        queue: &mut MonitorQueue,
        running: &mut usize,
        result_tx: &mpsc::Sender<CompletedRun>,
        error_tx: &mpsc::Sender<FailedRun>,
    ) {
        while *running < self.config.queue_capacity {
            let Ok(monitor) = queue.pop() else {
                break;
            };
            self.dispatch(monitor, running, result_tx, error_tx).await;
        }
    }

    /// Mark a monitor as run. A transient storage failure is surfaced but
    /// does not stop the dispatch.
    async fn touch(&self, monitor: &Monitor) {
        if let Err(err) = self.store.touch_last_run(monitor).await {
            self.surface(Diagnostic::new(Some(monitor.id), err));
        }
    }

    /// Resolve the previous envelope and spawn a runner for one invocation.
    async fn dispatch(
        &self,
        monitor: Monitor,
        running: &mut usize,
        result_tx: &mpsc::Sender<CompletedRun>,
        error_tx: &mpsc::Sender<FailedRun>,
    ) {
        let previous = match self.store.latest_report(&monitor).await {
            Ok(Some(report)) => report.to_envelope(),
            Ok(None) => {
                // First invocation: persist the seed so later ticks find it.
                match self.store.save_report(NewReport::seed(monitor.id)).await {
                    Ok(report) => report.to_envelope(),
                    Err(err) => {
                        self.surface(Diagnostic::new(Some(monitor.id), err));
                        ReportEnvelope::seed()
                    }
                }
            }
            Err(err) => {
                // Without the previous report the script would lose its
                // accumulated state; skip this invocation instead.
                self.surface(Diagnostic::new(Some(monitor.id), err));
                return;
            }
        };

        tracing::debug!(
            "dispatching_monitor: monitor={}, interpreter={}, script={}",
            monitor.id,
            monitor.interpreter,
            monitor.script_path.display(),
        );

        *running += 1;
        tokio::spawn(run_monitor_script(
            monitor,
            previous,
            result_tx.clone(),
            error_tx.clone(),
        ));
    }

    /// Persist a completed run's envelope.
    async fn persist(&self, done: CompletedRun) {
        let monitor_id = done.monitor.id;
        match self
            .store
            .save_report(NewReport::from_envelope(monitor_id, done.envelope))
            .await
        {
            Ok(report) => {
                tracing::info!(
                    "report_saved: monitor={}, report={}, significance={}",
                    monitor_id,
                    report.id,
                    report.significance.label(),
                );
            }
            // At-most-once: the report is lost.
            Err(err) => self.surface(Diagnostic::new(Some(monitor_id), err)),
        }
    }

    /// Forward a diagnostic to the external collector, best-effort.
    fn surface(&self, diagnostic: Diagnostic) {
        if let Err(err) = self.diagnostics.try_send(diagnostic) {
            tracing::warn!("diagnostic_dropped: {}", err);
        }
    }

    /// After cancellation: keep persisting deliveries from in-flight runners
    /// for a bounded grace period, then abandon the stragglers.
    async fn drain(
        &self,
        mut running: usize,
        result_rx: &mut mpsc::Receiver<CompletedRun>,
        error_rx: &mut mpsc::Receiver<FailedRun>,
    ) {
        if running == 0 || self.config.drain_grace.is_zero() {
            return;
        }

        tracing::info!("watcher_draining: in_flight={}", running);
        let deadline = Instant::now() + self.config.drain_grace;

        while running > 0 {
            tokio::select! {
                Some(done) = result_rx.recv() => {
                    running -= 1;
                    self.persist(done).await;
                }
                Some(failed) = error_rx.recv() => {
                    running -= 1;
                    self.surface(Diagnostic::new(Some(failed.monitor_id), failed.error));
                }
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::warn!("drain_grace_expired: abandoned={}", running);
                    break;
                }
            }
        }
    }
}
