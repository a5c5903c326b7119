//! Reconnect backoff policy and per-source retry state

use std::time::Duration;

use contracts::BackoffConfig;
use tokio::time::Instant;

/// Pure delay policy: `next = min(max, (unit + previous) * 2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    unit: Duration,
    max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

impl BackoffPolicy {
    pub fn new(unit: Duration, max: Duration) -> Self {
        Self { unit, max }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.unit(), config.max())
    }

    pub fn unit(&self) -> Duration {
        self.unit
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Delay to wait after a failure that followed `previous`.
    pub fn next_delay(&self, previous: Duration) -> Duration {
        self.unit
            .saturating_add(previous)
            .saturating_mul(2)
            .min(self.max)
    }

    /// Delay after a successful connection
    pub fn reset(&self) -> Duration {
        Duration::ZERO
    }
}

/// Mutable retry state owned by one connector.
///
/// Also carries the failure-log rate limiter: a persistently unreachable
/// source logs at most once per `log_interval`.
#[derive(Debug)]
pub struct BackoffState {
    policy: BackoffPolicy,
    delay: Duration,
    log_interval: Duration,
    last_logged: Option<Instant>,
}

impl BackoffState {
    pub fn new(policy: BackoffPolicy, log_interval: Duration) -> Self {
        Self {
            policy,
            delay: policy.reset(),
            log_interval,
            last_logged: None,
        }
    }

    /// Delay to sleep before the next dial
    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn on_failure(&mut self) -> Duration {
        self.delay = self.policy.next_delay(self.delay);
        self.delay
    }

    pub fn on_success(&mut self) {
        self.delay = self.policy.reset();
    }

    /// Returns true if a failure at `now` should be logged, and if so starts
    /// a new quiet window.
    pub fn should_log(&mut self, now: Instant) -> bool {
        match self.last_logged {
            Some(last) if now.saturating_duration_since(last) < self.log_interval => false,
            _ => {
                self.last_logged = Some(now);
                true
            }
        }
    }
}
