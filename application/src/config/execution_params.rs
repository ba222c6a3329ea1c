//! Execution parameters: job loop control.
//!
//! [`ExecutionParams`] groups the static timing parameters of the fan-out
//! executor, the job watcher and the job service. These are
//! application-layer concerns, not domain policy.

use std::time::Duration;

/// Timing parameters for running and observing jobs.
///
/// | Parameter | Used by | Default |
/// |-----------|---------|---------|
/// | `force_poll_interval` | fan-out executor | 500ms |
/// | `cancel_grace` | fan-out executor | 100ms |
/// | `watch_interval` | job watcher | 100ms |
/// | `job_timeout` | job service | 600s |
/// | `job_retention` | cleanup sweep | 24h |
/// | `cleanup_interval` | cleanup sweep | 1h |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionParams {
    /// How often running units are checked for skip and force-finish.
    pub force_poll_interval: Duration,
    /// How long cancelled units get to wind down after force-finish.
    pub cancel_grace: Duration,
    /// Snapshot polling interval of the job watcher.
    pub watch_interval: Duration,
    /// Soft budget for one whole job.
    pub job_timeout: Duration,
    /// How long finished jobs stay queryable.
    pub job_retention: Duration,
    /// Period of the cleanup sweep.
    pub cleanup_interval: Duration,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            force_poll_interval: Duration::from_millis(500),
            cancel_grace: Duration::from_millis(100),
            watch_interval: Duration::from_millis(100),
            job_timeout: Duration::from_secs(600),
            job_retention: Duration::from_secs(24 * 60 * 60),
            cleanup_interval: Duration::from_secs(60 * 60),
        }
    }
}

impl ExecutionParams {
    // ==================== Builder Methods ====================

    pub fn with_force_poll_interval(mut self, interval: Duration) -> Self {
        self.force_poll_interval = interval;
        self
    }

    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    pub fn with_watch_interval(mut self, interval: Duration) -> Self {
        self.watch_interval = interval;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn with_job_retention(mut self, retention: Duration) -> Self {
        self.job_retention = retention;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Retention as a chrono duration, for comparing against job timestamps
    pub fn retention_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.job_retention).unwrap_or(chrono::Duration::MAX)
    }
}
