//! Download retry policy

use crate::config::schema::RetrievalConfig;
use std::time::Duration;

/// Bounded linear backoff with a separate, larger base for throttling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per download, at least one
    pub max_attempts: u32,
    /// Delay after attempt `k` is `base_delay * k`
    pub base_delay: Duration,
    /// Delay after a rate-limited attempt `k` is `rate_limit_delay * k`
    pub rate_limit_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            base_delay: config.retry_delay(),
            rate_limit_delay: config.rate_limit_delay(),
        }
    }

    /// Pause after the 1-based `attempt` failed
    pub fn backoff(&self, attempt: u32, rate_limited: bool) -> Duration {
        let base = if rate_limited {
            self.rate_limit_delay
        } else {
            self.base_delay
        };
        base.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetrievalConfig::default())
    }
}
