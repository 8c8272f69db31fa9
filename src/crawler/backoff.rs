//! Retry delay policy for transient fetch failures

use crate::config::FetchConfig;
use rand::Rng;
use std::time::Duration;

/// Exponential backoff with proportional random jitter
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    base_ms: u64,
    max_ms: u64,
    jitter_percent: u64,
}

impl ExponentialBackoff {
    pub const fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            jitter_percent: 10,
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(config.backoff_base_ms, config.backoff_max_ms)
    }

    pub fn with_jitter(mut self, jitter_percent: u64) -> Self {
        self.jitter_percent = jitter_percent;
        self
    }

    /// Delay before retry number `attempt` (0-based)
    ///
    /// `base * 2^attempt`, capped at `max`, plus up to `jitter_percent` of
    /// the capped value. Never exceeds `max` by more than the jitter.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_ms
            .saturating_mul(2u64.saturating_pow(attempt.min(20)));
        let capped = exponential.min(self.max_ms);

        let jitter_range = capped.saturating_mul(self.jitter_percent) / 100;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..=jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped + jitter)
    }
}
