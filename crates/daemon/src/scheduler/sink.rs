// Where background cycle failures go. Ticks have no synchronous caller, so a
// failed push must be reported somewhere rather than dropped.

use std::path::PathBuf;

use tracing::error;

use super::registry::SchedulerId;
use crate::error::AutopushError;

/// A failed background cycle.
#[derive(Debug)]
pub struct CycleFailure {
    pub scheduler: SchedulerId,
    pub repository: PathBuf,
    pub error: AutopushError,
}

pub trait FailureSink: Send + Sync + 'static {
    fn report(&self, failure: &CycleFailure);
}

impl<F> FailureSink for F
where
    F: Fn(&CycleFailure) + Send + Sync + 'static,
{
    fn report(&self, failure: &CycleFailure) {
        self(failure)
    }
}

/// Logs the failure and keeps the scheduler running.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl FailureSink for TracingSink {
    fn report(&self, failure: &CycleFailure) {
        error!(
            scheduler = %failure.scheduler,
            repo = %failure.repository.display(),
            error = %failure.error,
            "reconciliation cycle failed"
        );
    }
}

/// Logs the failure and terminates the process with status 1.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExitProcessSink;

impl FailureSink for ExitProcessSink {
    fn report(&self, failure: &CycleFailure) {
        TracingSink.report(failure);
        error!(scheduler = %failure.scheduler, "exiting after failed reconciliation cycle");
        std::process::exit(1);
    }
}
