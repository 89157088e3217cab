//! Configuration module for Carwatch
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use carwatch::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("carwatch.toml")).unwrap();
//! println!("Watching: {}", config.monitor.target_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, FetcherConfig, MonitorConfig, SchedulerConfig, StorageBackend, StorageConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
