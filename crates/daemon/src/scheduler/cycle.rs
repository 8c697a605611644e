// One reconciliation cycle: fetch, dirty check, quiescence check, then
// stage/commit/push.
//
// The dirty check and the quiescence check are independent gates and both
// must pass. A dirty tree committed too recently is deferred so changes made
// within one period end up in a single commit. Any backend error ends the
// cycle; nothing is retried here.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::period::Period;
use crate::error::BackendError;
use crate::git::backend::{CommitRecord, Signature, VcsBackend, AUTOPUSH_COMMIT_MESSAGE};
use crate::git::gate::RepositoryHandle;

/// Pathspec staged when committing: the whole working tree.
const STAGE_ALL: &str = ".";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing to commit.
    Clean,
    /// Dirty, but the last commit is not older than the period yet.
    Deferred { elapsed: Duration },
    /// A commit was created and pushed.
    Pushed,
}

pub fn run_cycle<B: VcsBackend>(
    handle: &RepositoryHandle<B>,
    period: Period,
) -> Result<CycleOutcome, BackendError> {
    run_cycle_at(handle, period, Utc::now())
}

/// Like `run_cycle` but evaluates the quiescence gate at `now`.
pub fn run_cycle_at<B: VcsBackend>(
    handle: &RepositoryHandle<B>,
    period: Period,
    now: DateTime<Utc>,
) -> Result<CycleOutcome, BackendError> {
    let backend = handle.backend();
    let repo = handle.path().display();

    backend.fetch()?;

    let status = backend.status()?;
    if status.is_clean() {
        debug!(%repo, "working tree clean");
        return Ok(CycleOutcome::Clean);
    }

    // A handle always starts with history, but it can be rewritten underneath us.
    let last_commit = backend.last_commit()?;
    let elapsed = last_commit.as_ref().map_or(Duration::MAX, |commit| since_commit(commit, now));
    if elapsed <= period.as_duration() {
        debug!(%repo, ?status, elapsed_secs = elapsed.as_secs(), %period, "deferring commit");
        return Ok(CycleOutcome::Deferred { elapsed });
    }

    backend.add(STAGE_ALL)?;
    backend.commit(AUTOPUSH_COMMIT_MESSAGE, &Signature::autopush())?;
    backend.push()?;

    info!(%repo, ?status, "committed and pushed local changes");
    Ok(CycleOutcome::Pushed)
}

/// Whether enough time has passed since `last_commit` to commit again.
pub fn quiescence_elapsed(last_commit: &CommitRecord, now: DateTime<Utc>, period: Period) -> bool {
    since_commit(last_commit, now) > period.as_duration()
}

/// Commits dated in the future count as just made.
fn since_commit(commit: &CommitRecord, now: DateTime<Utc>) -> Duration {
    now.signed_duration_since(commit.committed_at).to_std().unwrap_or(Duration::ZERO)
}
