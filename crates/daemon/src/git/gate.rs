// Opens and validates the repository a scheduler will own.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::backend::{CommitRecord, RemoteTarget, VcsBackend};
use super::worker::GitCliBackend;
use crate::error::{BackendError, ConfigurationError};

/// An opened working directory with at least one commit. Owned by exactly
/// one scheduler.
#[derive(Debug)]
pub struct RepositoryHandle<B = GitCliBackend> {
    path: PathBuf,
    backend: B,
}

impl<B: VcsBackend> RepositoryHandle<B> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

pub struct RepositoryGate;

impl RepositoryGate {
    /// Open `path` with the git CLI backend, using the repository's default
    /// remote and upstream branch.
    pub fn open(path: impl AsRef<Path>) -> Result<RepositoryHandle, ConfigurationError> {
        Self::open_with_target(path, RemoteTarget::default())
    }

    pub fn open_with_target(
        path: impl AsRef<Path>,
        target: RemoteTarget,
    ) -> Result<RepositoryHandle, ConfigurationError> {
        let path = path.as_ref();
        let backend = GitCliBackend::new(path).with_target(target);
        Self::open_with(path, backend)
    }

    /// Validate `path` and wrap `backend` in a handle. Nothing in the
    /// repository is modified.
    pub fn open_with<B: VcsBackend>(
        path: impl AsRef<Path>,
        backend: B,
    ) -> Result<RepositoryHandle<B>, ConfigurationError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigurationError::PathNotFound(path.to_path_buf()));
        }
        if !path.is_dir() {
            return Err(ConfigurationError::NotADirectory(path.to_path_buf()));
        }

        let not_a_repository = |source: BackendError| ConfigurationError::NotARepository {
            path: path.to_path_buf(),
            source,
        };
        backend.verify_repository().map_err(not_a_repository)?;

        let head: Option<CommitRecord> = backend.last_commit().map_err(not_a_repository)?;
        let Some(head) = head else {
            return Err(ConfigurationError::EmptyHistory(path.to_path_buf()));
        };

        debug!(repo = %path.display(), head = %head.id, "repository opened");
        Ok(RepositoryHandle { path: path.to_path_buf(), backend })
    }
}
