// Version-control capabilities consumed by the scheduler.
//
// Every call is blocking and either completes or returns a `BackendError`.
// The scheduler treats all backend errors as fatal to the current cycle.

use chrono::{DateTime, Utc};

use crate::error::BackendError;

/// Author name used for every commit created by autopush.
pub const AUTOPUSH_AUTHOR_NAME: &str = "autopush";
/// Author address used for every commit created by autopush.
pub const AUTOPUSH_AUTHOR_EMAIL: &str = "autopush@github.com";
/// Message used for every commit created by autopush.
pub const AUTOPUSH_COMMIT_MESSAGE: &str = "Commit by autopush";

/// Working-tree state relative to the most recent commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeStatus {
    Clean,
    /// `changed` counts status entries, untracked files included.
    Dirty { changed: usize },
}

impl TreeStatus {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }
}

/// Read-only view of one commit in the history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub id: String,
    pub committed_at: DateTime<Utc>,
    pub author_name: String,
    pub author_email: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self { name: name.into(), email: email.into() }
    }

    /// The fixed synthetic identity autopush commits with.
    pub fn autopush() -> Self {
        Self::new(AUTOPUSH_AUTHOR_NAME, AUTOPUSH_AUTHOR_EMAIL)
    }
}

/// Which remote to fetch from and push to. Unset fields fall back to the
/// repository's own defaults (the tracked upstream).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteTarget {
    pub remote: Option<String>,
    pub branch: Option<String>,
}

impl RemoteTarget {
    pub fn new(remote: Option<String>, branch: Option<String>) -> Self {
        Self { remote, branch }
    }
}

/// Blocking version-control operations for one working directory.
pub trait VcsBackend: Send + Sync + 'static {
    /// Confirm the directory can be opened as a repository.
    fn verify_repository(&self) -> Result<(), BackendError>;

    fn fetch(&self) -> Result<(), BackendError>;

    fn status(&self) -> Result<TreeStatus, BackendError>;

    /// Up to `max_count` commits, most recent first. Empty when the
    /// repository has no history.
    fn log(&self, max_count: usize) -> Result<Vec<CommitRecord>, BackendError>;

    /// Stage every change (additions, modifications, deletions) under `pattern`.
    fn add(&self, pattern: &str) -> Result<(), BackendError>;

    fn commit(&self, message: &str, author: &Signature) -> Result<(), BackendError>;

    fn push(&self) -> Result<(), BackendError>;

    /// The most recent commit, if any.
    fn last_commit(&self) -> Result<Option<CommitRecord>, BackendError> {
        Ok(self.log(1)?.into_iter().next())
    }
}
