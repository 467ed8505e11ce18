//! Controller configuration.

use std::time::Duration;

/// Default delay between status checks while a task is pending or processing.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Tunables for the analysis workflow controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct ControllerConfig {
    /// Delay between the end of one status check and the start of the next.
    pub poll_interval: Duration,
}

impl ControllerConfig {
    /// Config with the given poll interval.
    #[must_use]
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}
