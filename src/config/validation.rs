use crate::config::types::{Config, FetcherConfig, MonitorConfig, SchedulerConfig, StorageConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_monitor_config(&config.monitor)?;
    validate_scheduler_config(&config.scheduler)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

/// Validates monitor configuration
fn validate_monitor_config(config: &MonitorConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.target_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid target_url '{}': {}", config.target_url, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "target_url '{}' must use http or https",
            config.target_url
        )));
    }

    if config.check_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "check_interval_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates scheduler configuration
fn validate_scheduler_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
    if config.max_requests_per_minute < 1 {
        return Err(ConfigError::Validation(format!(
            "max_requests_per_minute must be >= 1, got {}",
            config.max_requests_per_minute
        )));
    }

    ordered_range(
        "jitter_min_ms",
        config.jitter_min_ms,
        "jitter_max_ms",
        config.jitter_max_ms,
    )?;

    if config.rotate_every_min < 1 {
        return Err(ConfigError::Validation(format!(
            "rotate_every_min must be >= 1, got {}",
            config.rotate_every_min
        )));
    }

    ordered_range(
        "rotate_every_min",
        config.rotate_every_min,
        "rotate_every_max",
        config.rotate_every_max,
    )?;

    if !(0.0..=1.0).contains(&config.mobile_probability) {
        return Err(ConfigError::Validation(format!(
            "mobile_probability must be between 0 and 1, got {}",
            config.mobile_probability
        )));
    }

    ordered_range(
        "burst_pause_min_ms",
        config.burst_pause_min_ms,
        "burst_pause_max_ms",
        config.burst_pause_max_ms,
    )?;

    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.backoff_ceiling_ms < config.backoff_base_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_ceiling_ms ({}) must be >= backoff_base_ms ({})",
            config.backoff_ceiling_ms, config.backoff_base_ms
        )));
    }

    if !config.backoff_jitter_min.is_finite()
        || !config.backoff_jitter_max.is_finite()
        || config.backoff_jitter_min < 0.0
    {
        return Err(ConfigError::Validation(
            "backoff jitter bounds must be finite and non-negative".to_string(),
        ));
    }

    ordered_range(
        "backoff_jitter_min",
        config.backoff_jitter_min,
        "backoff_jitter_max",
        config.backoff_jitter_max,
    )?;

    if config.plausibility_markers.iter().any(|m| m.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "plausibility_markers cannot contain empty strings".to_string(),
        ));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.cache_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "cache_path cannot be empty".to_string(),
        ));
    }

    if config.ledger_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "ledger_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn ordered_range<T: PartialOrd + std::fmt::Display>(
    min_name: &str,
    min: T,
    max_name: &str,
    max: T,
) -> Result<(), ConfigError> {
    if min > max {
        return Err(ConfigError::Validation(format!(
            "{} ({}) must not exceed {} ({})",
            min_name, min, max_name, max
        )));
    }
    Ok(())
}
