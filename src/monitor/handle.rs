//! Shared monitor state and the handle foreground code uses to reach it
//!
//! Every lock here is held only for a single read or write, never across a
//! network call, so status reads do not wait for a cycle to finish.

use crate::cache::DetailCache;
use crate::ledger::Ledger;
use crate::monitor::report::{MonitorStatus, Progress};
use crate::state::MonitorState;
use crate::ConfigError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::Notify;
use url::Url;

pub(crate) struct Shared {
    state: RwLock<MonitorState>,
    target_url: RwLock<String>,
    stop_requested: AtomicBool,
    wake: Notify,
    progress: Mutex<Progress>,
    pub(crate) cache: Arc<Mutex<DetailCache>>,
    ledger: Mutex<Ledger>,
}

impl Shared {
    pub fn new(target_url: String, cache: Arc<Mutex<DetailCache>>, ledger: Ledger) -> Self {
        Self {
            state: RwLock::new(MonitorState::Idle),
            target_url: RwLock::new(target_url),
            stop_requested: AtomicBool::new(false),
            wake: Notify::new(),
            progress: Mutex::new(Progress::default()),
            cache,
            ledger: Mutex::new(ledger),
        }
    }

    pub fn state(&self) -> MonitorState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves to `next`; a stopped monitor stays stopped
    ///
    /// Overlapping `check_once` calls interleave their phases, so an
    /// out-of-order transition is logged and still applied.
    pub fn set_state(&self, next: MonitorState) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.is_terminal() {
            return;
        }
        if state.can_transition_to(next) {
            tracing::trace!("Monitor state {} -> {}", *state, next);
        } else {
            tracing::warn!("Unexpected monitor state change {} -> {}", *state, next);
        }
        *state = next;
    }

    pub fn target_url(&self) -> String {
        self.target_url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    /// Completes when `request_stop` is called (or already was)
    pub async fn stopped(&self) {
        if self.stop_requested() {
            return;
        }
        self.wake.notified().await;
    }

    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cache(&self) -> MutexGuard<'_, DetailCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable control surface for a running monitor
#[derive(Clone)]
pub struct MonitorHandle {
    shared: Arc<Shared>,
}

impl MonitorHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Asks the monitor to stop
    ///
    /// The in-flight step finishes, records extracted so far are still
    /// committed and reported, and no new cycle starts. An inter-cycle sleep
    /// is cut short.
    pub fn stop(&self) {
        tracing::info!("Stop requested");
        self.shared.request_stop();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.shared.stop_requested()
    }

    pub fn state(&self) -> MonitorState {
        self.shared.state()
    }

    /// Replaces the search URL; the next cycle uses it
    pub fn set_target_url(&self, url: &str) -> Result<(), ConfigError> {
        let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "{}: only http and https are supported",
                url
            )));
        }

        *self
            .shared
            .target_url
            .write()
            .unwrap_or_else(PoisonError::into_inner) = url.to_string();
        tracing::info!("Target URL set to {}", url);
        Ok(())
    }

    pub fn status(&self) -> MonitorStatus {
        let progress = self.shared.progress().clone();
        let known_ids = self.shared.ledger().len();
        let cached_details = self.shared.cache().len();

        MonitorStatus {
            state: self.shared.state(),
            target_url: self.shared.target_url(),
            cycles_completed: progress.cycles_completed,
            last_check_at: progress.last_check_at,
            last_new_count: progress.last_new_count,
            total_new: progress.total_new,
            known_ids,
            cached_details,
        }
    }
}
