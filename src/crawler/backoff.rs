//! Exponential backoff for retried fetches

use crate::config::FetcherConfig;
use rand::Rng;
use std::time::Duration;

/// Computes the wait before retrying a failed attempt
///
/// The delay is `min(base × 2^attempt, ceiling) × uniform(jitter_min, jitter_max)`,
/// and the result is capped at the ceiling again.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub ceiling: Duration,
    pub jitter_min: f64,
    pub jitter_max: f64,
}

impl BackoffPolicy {
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            base: Duration::from_millis(config.backoff_base_ms),
            ceiling: Duration::from_millis(config.backoff_ceiling_ms),
            jitter_min: config.backoff_jitter_min,
            jitter_max: config.backoff_jitter_max,
        }
    }

    /// Delay before retrying after failed attempt number `attempt` (0-based), without jitter
    pub fn raw_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.ceiling)
    }

    pub fn delay_for<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let raw = self.raw_delay(attempt);

        let jitter = if self.jitter_max > self.jitter_min {
            rng.gen_range(self.jitter_min..=self.jitter_max)
        } else {
            self.jitter_min
        };

        Duration::try_from_secs_f64(raw.as_secs_f64() * jitter)
            .unwrap_or(self.ceiling)
            .min(self.ceiling)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&FetcherConfig::default())
    }
}
