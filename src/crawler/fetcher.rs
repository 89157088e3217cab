//! HTTP page fetcher
//!
//! This module handles all HTTP requests for the monitor, including:
//! - Building the shared HTTP client
//! - Acquiring a scheduler slot (and identity) before every attempt
//! - Retry logic for throttling, server errors and transport failures
//! - Rejecting bodies that do not look like a real page

use crate::config::FetcherConfig;
use crate::crawler::backoff::BackoffPolicy;
use crate::crawler::scheduler::RequestScheduler;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A fetched page, ready for parsing
///
/// `url` is the final URL after redirects; relative links found in the body
/// resolve against it.
#[derive(Debug, Clone)]
pub struct ParsedPage {
    pub url: Url,
    pub body: String,
}

impl ParsedPage {
    pub fn new(url: Url, body: impl Into<String>) -> Self {
        Self {
            url,
            body: body.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("giving up on {url} after {attempts} attempts: {last_error}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Builds the HTTP client shared by every fetch
///
/// Identity headers are attached per request, so the client itself carries
/// no default user agent.
///
/// # Example
///
/// ```no_run
/// use carwatch::config::FetcherConfig;
/// use carwatch::crawler::build_http_client;
///
/// let client = build_http_client(&FetcherConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    let timeout = config.timeout();

    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages through the scheduler with retries
pub struct PageFetcher {
    client: Client,
    scheduler: Arc<RequestScheduler>,
    config: FetcherConfig,
    backoff: BackoffPolicy,
}

impl PageFetcher {
    pub fn new(client: Client, scheduler: Arc<RequestScheduler>, config: FetcherConfig) -> Self {
        let backoff = BackoffPolicy::from_config(&config);
        Self {
            client,
            scheduler,
            config,
            backoff,
        }
    }

    pub fn scheduler(&self) -> &Arc<RequestScheduler> {
        &self.scheduler
    }

    /// Fetches `url`, retrying transient failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx with plausible body | Return the page |
    /// | 2xx with implausible body | Back off, retry |
    /// | HTTP 429 | Rotate identity, wait `Retry-After` (or fallback), retry |
    /// | HTTP 5xx | Back off, retry |
    /// | Timeout / transport error | Back off, retry |
    /// | Other HTTP status | Fail immediately with `Status` |
    ///
    /// Every attempt acquires its own scheduler slot. No wait is taken after
    /// the final attempt.
    pub async fn fetch(&self, url: &str) -> Result<ParsedPage, FetchError> {
        let target = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 0..max_attempts {
            let has_next = attempt + 1 < max_attempts;
            let identity = self.scheduler.acquire_slot().await;

            tracing::debug!("Requesting {} (attempt {})", url, attempt + 1);

            let response = match self
                .client
                .get(target.clone())
                .headers(identity.headers().clone())
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    last_error = describe_transport_error(&e);
                    tracing::warn!(
                        "Attempt {} failed for {}: {}",
                        attempt + 1,
                        url,
                        last_error
                    );
                    if has_next {
                        self.back_off(attempt).await;
                    }
                    continue;
                }
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = parse_retry_after(response.headers())
                    .unwrap_or_else(|| self.config.retry_after_fallback());
                last_error = "HTTP 429 Too Many Requests".to_string();
                tracing::warn!(
                    "Rate limited on {}, waiting {} seconds",
                    url,
                    wait.as_secs()
                );
                self.scheduler.rotate_identity();
                if has_next {
                    tokio::time::sleep(wait).await;
                }
                continue;
            }

            if status.is_server_error() {
                last_error = format!("HTTP {}", status.as_u16());
                tracing::warn!("Server error {} for {}", status.as_u16(), url);
                if has_next {
                    self.back_off(attempt).await;
                }
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            let final_url = response.url().clone();
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    last_error = describe_transport_error(&e);
                    tracing::warn!("Could not read body of {}: {}", url, last_error);
                    if has_next {
                        self.back_off(attempt).await;
                    }
                    continue;
                }
            };

            if !self.is_plausible_markup(&body) {
                last_error = format!("implausible body ({} bytes)", body.len());
                tracing::warn!("Content validation failed for {}: {}", url, last_error);
                if has_next {
                    self.back_off(attempt).await;
                }
                continue;
            }

            tracing::trace!("Fetched {} ({} bytes)", final_url, body.len());
            return Ok(ParsedPage::new(final_url, body));
        }

        tracing::error!(
            "Failed to fetch {} after {} attempts: {}",
            url,
            max_attempts,
            last_error
        );

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: max_attempts,
            last_error,
        })
    }

    /// True when `body` looks like a real page rather than a block or error stub
    ///
    /// A body passes when it is at least `min_plausible_body` bytes long or
    /// contains any configured marker (case-insensitive).
    pub fn is_plausible_markup(&self, body: &str) -> bool {
        if body.len() >= self.config.min_plausible_body {
            return true;
        }

        let lowered = body.to_lowercase();
        self.config
            .plausibility_markers
            .iter()
            .any(|marker| lowered.contains(&marker.to_lowercase()))
    }

    async fn back_off(&self, attempt: u32) {
        let delay = self.backoff.delay_for(attempt, &mut rand::thread_rng());
        tracing::debug!("Backing off for {:.1}s", delay.as_secs_f64());
        tokio::time::sleep(delay).await;
    }
}

/// Reads `Retry-After` as whole seconds
///
/// HTTP-date values are not honoured and fall back to the configured wait.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    }
}
