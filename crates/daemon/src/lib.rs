// autopush-daemon: periodically commits and pushes local changes of git
// working trees once they have been quiet for a configured period.

pub mod config;
pub mod error;
pub mod git;
pub mod runtime;
pub mod scheduler;

pub use error::{AutopushError, BackendError, ConfigurationError};
pub use scheduler::{Autopush, Period, SchedulerOptions, SchedulerState};
