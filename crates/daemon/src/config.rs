// Daemon configuration file.
//
// Default location: `~/.autopush/config.toml`, overridable with the
// `AUTOPUSH_CONFIG` environment variable.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigurationError;
use crate::git::backend::RemoteTarget;
use crate::scheduler::Period;

/// Environment variable pointing at an alternative config file.
pub const CONFIG_PATH_ENV: &str = "AUTOPUSH_CONFIG";

/// Default quiescence period: five minutes.
const DEFAULT_PERIOD_SECS: u64 = 300;

/// Root directory for autopush state: `~/.autopush/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".autopush"))
}

/// Path to the config file, honoring `AUTOPUSH_CONFIG`.
pub fn config_path() -> Option<PathBuf> {
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => global_dir().map(|d| d.join("config.toml")),
    }
}

// ── Daemon config ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutopushConfig {
    /// Period applied to repositories without their own `period_secs`.
    pub period_secs: u64,
    /// What to do when a background cycle fails.
    pub on_failure: FailurePolicy,
    /// Repositories to reconcile.
    #[serde(rename = "repository")]
    pub repositories: Vec<RepositoryConfig>,
}

impl Default for AutopushConfig {
    fn default() -> Self {
        Self {
            period_secs: DEFAULT_PERIOD_SECS,
            on_failure: FailurePolicy::Log,
            repositories: Vec::new(),
        }
    }
}

impl AutopushConfig {
    /// Load from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path().ok_or(ConfigError::NoHomeDir)?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    /// Effective period for `repository`.
    pub fn period_for(&self, repository: &RepositoryConfig) -> Result<Period, ConfigurationError> {
        Period::from_secs(repository.period_secs.unwrap_or(self.period_secs))
    }
}

/// One `[[repository]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Working-tree directory.
    pub path: PathBuf,
    /// Overrides the top-level `period_secs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_secs: Option<u64>,
    /// Remote to fetch from and push to (defaults to the upstream's remote).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    /// Branch to push to (defaults to the upstream branch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl RepositoryConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), period_secs: None, remote: None, branch: None }
    }

    pub fn remote_target(&self) -> RemoteTarget {
        RemoteTarget::new(self.remote.clone(), self.branch.clone())
    }
}

/// Handling of failed background cycles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log and wait for the next tick.
    Log,
    /// Log and exit the process.
    Exit,
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    NoHomeDir,
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoHomeDir => write!(f, "could not determine home directory"),
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NoHomeDir => None,
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Serialize(e) => Some(e),
        }
    }
}
