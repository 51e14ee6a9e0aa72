use std::time::Duration;

/// Default poll cadence, matching the backend's batch simulation step.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default nominal run time of a batch.
pub const DEFAULT_NOMINAL_DURATION: Duration = Duration::from_secs(60);

const MIN_DURATION: Duration = Duration::from_millis(1);

/// Per-session monitor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    poll_interval: Duration,
    nominal_duration: Duration,
    fetch_timeout: Option<Duration>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            nominal_duration: DEFAULT_NOMINAL_DURATION,
            fetch_timeout: None,
        }
    }
}

impl MonitorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero is bumped to one millisecond; the timer needs a positive period.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_DURATION);
        self
    }

    pub fn with_nominal_duration(mut self, duration: Duration) -> Self {
        self.nominal_duration = duration.max(MIN_DURATION);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout.max(MIN_DURATION));
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn nominal_duration(&self) -> Duration {
        self.nominal_duration
    }

    /// Deadline for a single fetch. Defaults to three quarters of the poll
    /// interval so a hung request is abandoned before the next tick is due.
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
            .unwrap_or_else(|| (self.poll_interval * 3 / 4).max(MIN_DURATION))
    }
}
