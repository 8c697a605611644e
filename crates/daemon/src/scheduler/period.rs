use std::fmt::{Display, Formatter};
use std::time::Duration;

use crate::error::ConfigurationError;

/// Periods at or below this are rejected to keep the remote from being
/// hammered by a tight loop.
pub const MIN_PERIOD: Duration = Duration::from_secs(60);

/// Quiescence period and tick interval of a scheduler. Always longer than
/// [`MIN_PERIOD`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(Duration);

impl Period {
    pub fn new(period: Duration) -> Result<Self, ConfigurationError> {
        if period <= MIN_PERIOD {
            return Err(ConfigurationError::PeriodTooShort { period });
        }
        Ok(Self(period))
    }

    pub fn from_secs(secs: u64) -> Result<Self, ConfigurationError> {
        Self::new(Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl TryFrom<Duration> for Period {
    type Error = ConfigurationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.0.as_secs())
    }
}
