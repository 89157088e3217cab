//! Carwatch: a classifieds listing monitor
//!
//! This crate periodically fetches a vehicle search-results page, extracts
//! structured listing records (listing page first, then each detail page),
//! and reports the listings it has not seen before. Outbound traffic goes
//! through a pacing scheduler that rotates browser identities, detail pages
//! are cached per listing id, and previously seen ids live in a durable
//! append-only ledger.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod ledger;
pub mod model;
pub mod monitor;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Carwatch operations
#[derive(Debug, Error)]
pub enum CarwatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Carwatch operations
pub type Result<T> = std::result::Result<T, CarwatchError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use cache::DetailCache;
pub use config::Config;
pub use ledger::{Ledger, Partition};
pub use model::{DetailAttributes, ListingRecord, ListingStub, UNKNOWN};
pub use monitor::{CycleReport, Monitor, MonitorHandle, MonitorStatus};
pub use state::MonitorState;
