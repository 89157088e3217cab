use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Carwatch
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Builds a configuration with defaults everywhere except the monitor section
    pub fn new(monitor: MonitorConfig) -> Self {
        Self {
            monitor,
            scheduler: SchedulerConfig::default(),
            fetcher: FetcherConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Monitoring loop configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MonitorConfig {
    /// Search-results URL to watch; the query string is opaque to the monitor
    pub target_url: String,

    /// Seconds to sleep between check cycles
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Treat everything seen on the first run as already known
    #[serde(default = "default_true")]
    pub baseline_on_first_run: bool,

    /// Whether cycle reports are handed to the notification sink
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
}

impl MonitorConfig {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            check_interval_secs: default_check_interval(),
            baseline_on_first_run: true,
            notifications_enabled: true,
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

fn default_check_interval() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

/// Request pacing and identity rotation configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SchedulerConfig {
    /// Ceiling on requests inside any sliding one-minute window
    pub max_requests_per_minute: u32,

    /// Fixed floor between consecutive requests (milliseconds)
    pub min_delay_ms: u64,

    /// Bounds of the random delay added to every request (milliseconds)
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,

    /// Bounds of the randomized request count between identity rotations
    pub rotate_every_min: u32,
    pub rotate_every_max: u32,

    /// Chance that a freshly rotated identity is a mobile browser
    pub mobile_probability: f64,

    /// Requests between long pauses; 0 disables burst pauses
    pub burst_size: u32,

    /// Bounds of the long pause (milliseconds)
    pub burst_pause_min_ms: u64,
    pub burst_pause_max_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_requests_per_minute: 15,
            min_delay_ms: 2000,
            jitter_min_ms: 500,
            jitter_max_ms: 2000,
            rotate_every_min: 3,
            rotate_every_max: 7,
            mobile_probability: 0.1,
            burst_size: 5,
            burst_pause_min_ms: 10_000,
            burst_pause_max_ms: 20_000,
        }
    }
}

impl SchedulerConfig {
    /// A configuration with every delay disabled, for tests and local mocks
    pub fn unthrottled() -> Self {
        Self {
            max_requests_per_minute: 10_000,
            min_delay_ms: 0,
            jitter_min_ms: 0,
            jitter_max_ms: 0,
            burst_size: 0,
            burst_pause_min_ms: 0,
            burst_pause_max_ms: 0,
            ..Self::default()
        }
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }
}

/// HTTP fetch and retry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetcherConfig {
    /// Total attempts per fetch, retries included
    pub max_attempts: u32,

    /// Per-request timeout (seconds)
    pub timeout_secs: u64,

    /// Exponential backoff base delay (milliseconds)
    pub backoff_base_ms: u64,

    /// Upper bound on any single backoff sleep (milliseconds)
    pub backoff_ceiling_ms: u64,

    /// Multiplicative jitter range applied to each backoff delay
    pub backoff_jitter_min: f64,
    pub backoff_jitter_max: f64,

    /// Sleep after HTTP 429 when the response carries no usable Retry-After
    pub retry_after_fallback_secs: u64,

    /// Bodies at least this long are accepted without any marker
    pub min_plausible_body: usize,

    /// Case-insensitive substrings that mark a body as real site markup
    pub plausibility_markers: Vec<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_secs: 30,
            backoff_base_ms: 1000,
            backoff_ceiling_ms: 60_000,
            backoff_jitter_min: 1.0,
            backoff_jitter_max: 2.0,
            retry_after_fallback_secs: 60,
            min_plausible_body: 10_000,
            plausibility_markers: vec![
                "<html".to_string(),
                "<body".to_string(),
                "turbo.az".to_string(),
                "products-i".to_string(),
            ],
        }
    }
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_after_fallback(&self) -> Duration {
        Duration::from_secs(self.retry_after_fallback_secs)
    }
}

/// Persistence backend for the detail cache and the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Whole-map JSON document rewritten on flush
    Json,
    /// Append-only line log replayed at startup
    Log,
    /// SQLite key/value tables
    Sqlite,
}

/// Storage configuration
///
/// The cache and the ledger pick their backends separately. The defaults
/// keep the cache as one JSON document and the ledger as a plain id list,
/// one id per line.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageConfig {
    pub cache_backend: StorageBackend,

    /// Detail cache location
    pub cache_path: PathBuf,

    pub ledger_backend: StorageBackend,

    /// Known-id ledger location
    pub ledger_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_backend: StorageBackend::Json,
            cache_path: PathBuf::from("car_details_cache.json"),
            ledger_backend: StorageBackend::Log,
            ledger_path: PathBuf::from("known_cars.txt"),
        }
    }
}
