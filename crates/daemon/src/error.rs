// Error taxonomy: configuration, backend, shutdown.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Invalid construction arguments or an unusable repository. Always surfaced
/// synchronously from construction and never retried.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("period must be longer than one minute, got {}s", .period.as_secs())]
    PeriodTooShort { period: Duration },

    #[error("repository path `{}` does not exist", .0.display())]
    PathNotFound(PathBuf),

    #[error("repository path `{}` is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("could not open repository at `{}`", .path.display())]
    NotARepository {
        path: PathBuf,
        #[source]
        source: BackendError,
    },

    #[error("repository at `{}` does not have a commit", .0.display())]
    EmptyHistory(PathBuf),
}

/// Any failure reported by the version-control backend. Fatal to the
/// current cycle only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    #[error("failed to run `{command}`: {message}")]
    SpawnFailed { command: String, message: String },

    #[error("`{command}` failed with code {code:?}: {}", .stderr.trim())]
    CommandFailed { command: String, code: Option<i32>, stderr: String },

    #[error("unexpected output from `{command}`: {message}")]
    UnexpectedOutput { command: String, message: String },
}

#[derive(Debug, Error)]
pub enum AutopushError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The bounded shutdown wait elapsed while a cycle was still running.
    /// The cycle is not interrupted.
    #[error("scheduler did not stop within {}s", .waited.as_secs())]
    ShutdownTimeout { waited: Duration },

    /// The blocking task running a cycle panicked or was cancelled.
    #[error("reconciliation worker failed: {message}")]
    Worker { message: String },
}

impl AutopushError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
