// Reconciliation scheduler: runs one cycle at construction, then one per
// period on a dedicated worker task until shut down.
//
// Cycles of one instance never overlap: the worker awaits each cycle before
// polling the timer again, and a late tick is delayed rather than doubled up.
// Backend calls run on the blocking pool so they never stall the runtime.

pub mod cycle;
pub mod period;
pub mod registry;
pub mod sink;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::error::AutopushError;
use crate::git::backend::VcsBackend;
use crate::git::gate::{RepositoryGate, RepositoryHandle};

pub use cycle::{run_cycle, run_cycle_at, CycleOutcome};
pub use period::{Period, MIN_PERIOD};
pub use registry::{InstanceInfo, SchedulerId};
pub use sink::{CycleFailure, ExitProcessSink, FailureSink, TracingSink};

/// Upper bound on how long `shutdown(true)` waits for an in-flight cycle.
pub const SHUTDOWN_WAIT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    ShuttingDown,
    Stopped,
}

/// Optional knobs for a scheduler.
#[derive(Clone)]
pub struct SchedulerOptions {
    failure_sink: Arc<dyn FailureSink>,
    shutdown_wait: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self { failure_sink: Arc::new(TracingSink), shutdown_wait: SHUTDOWN_WAIT }
    }
}

impl SchedulerOptions {
    /// Route failures of background ticks to `sink` instead of the log.
    pub fn with_failure_sink(mut self, sink: impl FailureSink) -> Self {
        self.failure_sink = Arc::new(sink);
        self
    }

    pub fn with_shared_failure_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.failure_sink = sink;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_shutdown_wait(mut self, wait: Duration) -> Self {
        self.shutdown_wait = wait;
        self
    }
}

/// Control block shared by the handle, the worker, and the registry.
pub(crate) struct SchedulerControl {
    id: SchedulerId,
    repository: PathBuf,
    period: Period,
    shutdown_wait: Duration,
    stop_tx: watch::Sender<bool>,
    state_tx: watch::Sender<SchedulerState>,
}

impl SchedulerControl {
    pub(crate) fn id(&self) -> SchedulerId {
        self.id
    }

    pub(crate) fn state(&self) -> SchedulerState {
        *self.state_tx.borrow()
    }

    pub(crate) fn info(&self) -> InstanceInfo {
        InstanceInfo {
            id: self.id,
            repository: self.repository.clone(),
            period: self.period,
            state: self.state(),
        }
    }

    pub(crate) async fn shutdown(&self, await_completion: bool) -> Result<(), AutopushError> {
        let mut state_rx = self.state_tx.subscribe();
        if *state_rx.borrow_and_update() == SchedulerState::Stopped {
            return Ok(());
        }

        let requested = self.state_tx.send_if_modified(|state| {
            if *state == SchedulerState::Running {
                *state = SchedulerState::ShuttingDown;
                true
            } else {
                false
            }
        });
        if requested {
            info!(scheduler = %self.id, repo = %self.repository.display(), "shutdown requested");
        }
        self.stop_tx.send_replace(true);

        if !await_completion {
            return Ok(());
        }

        // The sender lives in `self`, so `wait_for` cannot observe a closed channel.
        let waited = time::timeout(
            self.shutdown_wait,
            state_rx.wait_for(|state| *state == SchedulerState::Stopped),
        )
        .await
        .map(|_| ());

        match waited {
            Ok(()) => Ok(()),
            Err(_) => Err(AutopushError::ShutdownTimeout { waited: self.shutdown_wait }),
        }
    }

    /// Deregisters before publishing `Stopped`, so a waiter woken by the state
    /// change never finds the instance still registered.
    fn mark_stopped(&self) {
        registry::deregister(self.id);
        self.state_tx.send_replace(SchedulerState::Stopped);
        info!(scheduler = %self.id, repo = %self.repository.display(), "scheduler stopped");
    }
}

/// A running reconciliation scheduler for one repository.
///
/// Dropping the handle does not stop the scheduler; it stays registered and
/// keeps ticking until [`Autopush::shutdown`] or [`registry::shutdown_all`].
pub struct Autopush {
    control: Arc<SchedulerControl>,
}

impl Autopush {
    /// Open the repository at `path` and start reconciling it every `period`.
    ///
    /// Runs one cycle before returning so a bad remote, missing credentials,
    /// or a missing upstream branch fail here instead of on the first tick.
    pub async fn start(period: Duration, path: impl AsRef<Path>) -> Result<Self, AutopushError> {
        let period = Period::new(period)?;
        let handle = RepositoryGate::open(path)?;
        Self::start_with_options(period, handle, SchedulerOptions::default()).await
    }

    pub async fn start_with_handle<B: VcsBackend>(
        period: Period,
        handle: RepositoryHandle<B>,
    ) -> Result<Self, AutopushError> {
        Self::start_with_options(period, handle, SchedulerOptions::default()).await
    }

    pub async fn start_with_options<B: VcsBackend>(
        period: Period,
        handle: RepositoryHandle<B>,
        options: SchedulerOptions,
    ) -> Result<Self, AutopushError> {
        let handle = Arc::new(handle);
        let outcome = execute_cycle(handle.clone(), period).await?;
        debug!(repo = %handle.path().display(), ?outcome, "initial reconciliation cycle finished");

        let (stop_tx, stop_rx) = watch::channel(false);
        let (state_tx, _) = watch::channel(SchedulerState::Running);
        let control = Arc::new(SchedulerControl {
            id: SchedulerId::new(),
            repository: handle.path().to_path_buf(),
            period,
            shutdown_wait: options.shutdown_wait,
            stop_tx,
            state_tx,
        });

        registry::register(control.clone());
        tokio::spawn(run_worker(control.clone(), handle, period, options.failure_sink, stop_rx));

        info!(scheduler = %control.id, repo = %control.repository.display(), %period, "scheduler started");
        Ok(Self { control })
    }

    pub fn id(&self) -> SchedulerId {
        self.control.id
    }

    pub fn repository_path(&self) -> &Path {
        &self.control.repository
    }

    pub fn period(&self) -> Period {
        self.control.period
    }

    pub fn state(&self) -> SchedulerState {
        self.control.state()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.control.state_tx.subscribe()
    }

    /// Stop scheduling new cycles. With `await_completion`, wait up to
    /// [`SHUTDOWN_WAIT`] for a cycle in progress to finish; it is never
    /// interrupted. Calling this on a stopped scheduler is a no-op.
    pub async fn shutdown(&self, await_completion: bool) -> Result<(), AutopushError> {
        self.control.shutdown(await_completion).await
    }
}

async fn run_worker<B: VcsBackend>(
    control: Arc<SchedulerControl>,
    handle: Arc<RepositoryHandle<B>>,
    period: Period,
    sink: Arc<dyn FailureSink>,
    mut stop_rx: watch::Receiver<bool>,
) {
    // Reaches `Stopped` even if a failure sink panics and unwinds the task.
    let _stopped = StopOnExit(control.clone());

    let tick = period.as_duration();
    let mut ticker = time::interval_at(Instant::now() + tick, tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            // Only ever flipped to `true`; a closed channel also means stop.
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {}
        }

        match execute_cycle(handle.clone(), period).await {
            Ok(outcome) => {
                debug!(scheduler = %control.id, ?outcome, "reconciliation cycle finished");
            }
            Err(error) => sink.report(&CycleFailure {
                scheduler: control.id,
                repository: control.repository.clone(),
                error,
            }),
        }
    }
}

struct StopOnExit(Arc<SchedulerControl>);

impl Drop for StopOnExit {
    fn drop(&mut self) {
        self.0.mark_stopped();
    }
}

async fn execute_cycle<B: VcsBackend>(
    handle: Arc<RepositoryHandle<B>>,
    period: Period,
) -> Result<CycleOutcome, AutopushError> {
    let outcome = tokio::task::spawn_blocking(move || run_cycle(&handle, period))
        .await
        .map_err(|error| AutopushError::Worker { message: error.to_string() })??;
    Ok(outcome)
}
