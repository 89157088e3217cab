//! Request scheduler for pacing outbound traffic
//!
//! Every outbound request (including retries) first acquires a slot here.
//! The scheduler enforces:
//! - A per-minute ceiling over a sliding 60-second window
//! - A minimum delay between consecutive requests, plus random jitter
//! - A longer randomized pause after every `burst_size` requests
//! - Browser identity rotation every few requests
//!
//! Callers are serialized: the pacing state is held behind an async mutex for
//! the whole wait, so two concurrent callers never observe the same free slot.

use crate::config::SchedulerConfig;
use crate::crawler::identity::{Identity, IdentityPool};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Length of the sliding rate window
const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Slack added when waiting for the rate window to drain
const WINDOW_SLACK: Duration = Duration::from_secs(1);

/// Pacing bookkeeping, only touched while holding the gate
struct PacingState {
    /// Issue times of requests inside the current window, oldest first
    window: VecDeque<Instant>,

    last_issued: Option<Instant>,

    /// Requests issued since the last burst pause
    since_pause: u32,

    /// Requests left before the identity rotates
    until_rotation: u32,
}

pub struct RequestScheduler {
    config: SchedulerConfig,
    pool: IdentityPool,
    gate: tokio::sync::Mutex<PacingState>,
    rng: Mutex<StdRng>,
    identity: RwLock<Identity>,
    issued: AtomicU64,
    rotations: AtomicU64,
}

impl RequestScheduler {
    /// Creates a scheduler seeded from the OS
    pub fn new(config: SchedulerConfig) -> Self {
        Self::from_rng(config, StdRng::from_entropy())
    }

    /// Creates a scheduler with a reproducible random stream
    pub fn with_seed(config: SchedulerConfig, seed: u64) -> Self {
        Self::from_rng(config, StdRng::seed_from_u64(seed))
    }

    fn from_rng(config: SchedulerConfig, mut rng: StdRng) -> Self {
        let pool = IdentityPool::new(config.mobile_probability);
        let identity = pool.draw(&mut rng, None);
        let until_rotation = rotation_interval(&config, &mut rng);

        tracing::debug!("Initial identity: {}", identity.user_agent());

        Self {
            pool,
            gate: tokio::sync::Mutex::new(PacingState {
                window: VecDeque::new(),
                last_issued: None,
                since_pause: 0,
                until_rotation,
            }),
            rng: Mutex::new(rng),
            identity: RwLock::new(identity),
            issued: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
            config,
        }
    }

    /// Waits until a request may be issued and returns the identity to use
    ///
    /// # Pacing order
    ///
    /// 1. If the last 60 seconds already hold the per-minute ceiling, sleep
    ///    until the oldest entry leaves the window (plus one second) and
    ///    start a fresh window
    /// 2. After `burst_size` requests, take a long randomized pause
    /// 3. Honour the minimum delay since the previous request
    /// 4. Add random jitter
    /// 5. Record the request and rotate the identity when its countdown ends
    pub async fn acquire_slot(&self) -> Identity {
        let mut pacing = self.gate.lock().await;

        let now = Instant::now();
        while let Some(&oldest) = pacing.window.front() {
            if now.duration_since(oldest) >= RATE_WINDOW {
                pacing.window.pop_front();
            } else {
                break;
            }
        }

        let ceiling = self.config.max_requests_per_minute.max(1) as usize;
        if pacing.window.len() >= ceiling {
            if let Some(&oldest) = pacing.window.front() {
                let wait = RATE_WINDOW.saturating_sub(now.duration_since(oldest)) + WINDOW_SLACK;
                tracing::info!(
                    "Rate limit reached, sleeping for {:.1} seconds",
                    wait.as_secs_f64()
                );
                sleep(wait).await;
            }
            pacing.window.clear();
        }

        if self.config.burst_size > 0 && pacing.since_pause >= self.config.burst_size {
            let pause = self.random_millis(
                self.config.burst_pause_min_ms,
                self.config.burst_pause_max_ms,
            );
            tracing::info!(
                "Taking a {:.1}s break after {} requests",
                pause.as_secs_f64(),
                pacing.since_pause
            );
            sleep(pause).await;
            pacing.since_pause = 0;
        }

        if let Some(last) = pacing.last_issued {
            let elapsed = last.elapsed();
            let min_delay = self.config.min_delay();
            if elapsed < min_delay {
                sleep(min_delay - elapsed).await;
            }
        }

        let jitter = self.random_millis(self.config.jitter_min_ms, self.config.jitter_max_ms);
        if !jitter.is_zero() {
            sleep(jitter).await;
        }

        let issued_at = Instant::now();
        pacing.window.push_back(issued_at);
        pacing.last_issued = Some(issued_at);
        pacing.since_pause += 1;
        let count = self.issued.fetch_add(1, Ordering::Relaxed) + 1;

        pacing.until_rotation = pacing.until_rotation.saturating_sub(1);
        if pacing.until_rotation == 0 {
            self.rotate_identity();
            pacing.until_rotation = {
                let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                rotation_interval(&self.config, &mut *rng)
            };
            tracing::debug!("Rotated user agent after {} requests", count);
        }

        self.active_identity()
    }

    /// Replaces the active identity with a different one
    ///
    /// Called on the rotation schedule and whenever the site answers 429.
    pub fn rotate_identity(&self) {
        let current = self.active_identity();
        let next = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            self.pool.draw(&mut *rng, Some(current.user_agent()))
        };

        tracing::debug!(
            "Switching identity to {} ({})",
            next.user_agent(),
            if next.is_mobile() { "mobile" } else { "desktop" }
        );

        *self.identity.write().unwrap_or_else(PoisonError::into_inner) = next;
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    /// The identity the next request will carry
    pub fn active_identity(&self) -> Identity {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of identity rotations so far
    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    /// Number of slots granted so far
    pub fn request_count(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn random_millis(&self, min: u64, max: u64) -> Duration {
        if max <= min {
            return Duration::from_millis(min);
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        Duration::from_millis(rng.gen_range(min..=max))
    }
}

/// Draws how many requests the next identity will serve
fn rotation_interval<R: Rng + ?Sized>(config: &SchedulerConfig, rng: &mut R) -> u32 {
    let min = config.rotate_every_min.max(1);
    let max = config.rotate_every_max.max(min);
    rng.gen_range(min..=max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn paced_config(per_minute: u32) -> SchedulerConfig {
        SchedulerConfig {
            max_requests_per_minute: per_minute,
            ..SchedulerConfig::unthrottled()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unthrottled_does_not_wait() {
        let scheduler = RequestScheduler::with_seed(SchedulerConfig::unthrottled(), 1);
        let start = Instant::now();

        for _ in 0..20 {
            scheduler.acquire_slot().await;
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(scheduler.request_count(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_window_ceiling() {
        let config = SchedulerConfig {
            rotate_every_min: 2,
            rotate_every_max: 3,
            ..paced_config(2)
        };
        let scheduler = RequestScheduler::with_seed(config, 42);
        let start = Instant::now();

        for _ in 0..5 {
            scheduler.acquire_slot().await;
        }

        // 2 + 2 + 1 requests need two full window waits
        assert!(start.elapsed() >= Duration::from_secs(120));
        assert!(scheduler.rotations() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_allows_ceiling_without_waiting() {
        let scheduler = RequestScheduler::with_seed(paced_config(3), 2);
        let start = Instant::now();

        for _ in 0..3 {
            scheduler.acquire_slot().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));

        scheduler.acquire_slot().await;
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_minimum_delay_between_requests() {
        let config = SchedulerConfig {
            min_delay_ms: 2000,
            ..SchedulerConfig::unthrottled()
        };
        let scheduler = RequestScheduler::with_seed(config, 3);
        let start = Instant::now();

        scheduler.acquire_slot().await;
        scheduler.acquire_slot().await;
        scheduler.acquire_slot().await;

        assert!(start.elapsed() >= Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_jitter_stays_in_range() {
        let config = SchedulerConfig {
            jitter_min_ms: 500,
            jitter_max_ms: 2000,
            ..SchedulerConfig::unthrottled()
        };
        let scheduler = RequestScheduler::with_seed(config, 4);

        for _ in 0..5 {
            let before = Instant::now();
            scheduler.acquire_slot().await;
            let waited = before.elapsed();
            assert!(waited >= Duration::from_millis(500));
            assert!(waited <= Duration::from_millis(2001));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_pause() {
        let config = SchedulerConfig {
            burst_size: 2,
            burst_pause_min_ms: 10_000,
            burst_pause_max_ms: 20_000,
            ..SchedulerConfig::unthrottled()
        };
        let scheduler = RequestScheduler::with_seed(config, 5);
        let start = Instant::now();

        scheduler.acquire_slot().await;
        scheduler.acquire_slot().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        scheduler.acquire_slot().await;
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert!(start.elapsed() <= Duration::from_millis(20_001));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_are_serialized() {
        let config = SchedulerConfig {
            min_delay_ms: 1000,
            ..SchedulerConfig::unthrottled()
        };
        let scheduler = Arc::new(RequestScheduler::with_seed(config, 6));
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let scheduler = Arc::clone(&scheduler);
                tokio::spawn(async move {
                    scheduler.acquire_slot().await;
                    Instant::now()
                })
            })
            .collect();

        let mut times = Vec::new();
        for handle in handles {
            times.push(handle.await.unwrap());
        }
        times.sort();

        for pair in times.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(1000));
        }
        assert!(start.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test]
    async fn test_rotation_countdown() {
        let config = SchedulerConfig {
            rotate_every_min: 3,
            rotate_every_max: 3,
            ..SchedulerConfig::unthrottled()
        };
        let scheduler = RequestScheduler::with_seed(config, 7);

        for _ in 0..9 {
            scheduler.acquire_slot().await;
        }
        assert_eq!(scheduler.rotations(), 3);
    }

    #[test]
    fn test_manual_rotation_changes_user_agent() {
        let config = SchedulerConfig {
            mobile_probability: 0.0,
            ..SchedulerConfig::unthrottled()
        };
        let scheduler = RequestScheduler::with_seed(config, 8);

        for _ in 0..10 {
            let before = scheduler.active_identity().user_agent();
            scheduler.rotate_identity();
            assert_ne!(scheduler.active_identity().user_agent(), before);
        }
        assert_eq!(scheduler.rotations(), 10);
    }
}
