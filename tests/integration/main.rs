//! Integration tests for carwatch
//!
//! These tests run the fetcher and the monitor against wiremock servers
//! with pacing disabled.

mod fetch_tests;
mod monitor_tests;

use carwatch::config::{FetcherConfig, SchedulerConfig};
use carwatch::crawler::{build_http_client, PageFetcher, RequestScheduler};
use std::sync::Arc;

/// Fetcher settings with millisecond backoff
pub fn fast_fetcher_config() -> FetcherConfig {
    FetcherConfig {
        max_attempts: 3,
        timeout_secs: 5,
        backoff_base_ms: 1,
        backoff_ceiling_ms: 10,
        ..FetcherConfig::default()
    }
}

/// A fetcher whose scheduler never waits
pub fn fast_fetcher(config: FetcherConfig) -> Arc<PageFetcher> {
    let scheduler = Arc::new(RequestScheduler::with_seed(SchedulerConfig::unthrottled(), 7));
    let client = build_http_client(&config).expect("Failed to build HTTP client");
    Arc::new(PageFetcher::new(client, scheduler, config))
}

/// A results page linking to one listing per id
pub fn listing_page(ids: &[&str]) -> String {
    let items: String = ids
        .iter()
        .map(|id| {
            format!(
                r#"<div class="products-i">
                    <a class="products-i__link" href="/autos/{id}-toyota-camry"></a>
                    <img src="/uploads/thumb/cars/{id}.jpg">
                    <div class="products-i__name">Toyota Camry {id}</div>
                    <div class="products-i__price">25 500 AZN</div>
                    <div class="products-i__attributes">
                        <span class="products-i__attributes-i">2018</span>
                        <span class="products-i__attributes-i">2.5 L</span>
                        <span class="products-i__attributes-i">85 000 km</span>
                    </div>
                </div>"#
            )
        })
        .collect();

    format!("<html><body><div class=\"products-container\">{}</div></body></html>", items)
}

/// A detail page with a small attribute panel
pub fn detail_page(city: &str) -> String {
    format!(
        r#"<html><body>
            <div class="product-properties">
                <div class="product-properties-i"><label>Şəhər</label><div class="product-properties-i-value">{city}</div></div>
                <div class="product-properties-i"><label>Marka</label><div class="product-properties-i-value">Toyota</div></div>
                <div class="product-properties-i"><label>Model</label><div class="product-properties-i-value">Camry</div></div>
            </div>
            <div class="product-description">Təzə maşın</div>
            <div class="product-photos"><img src="/uploads/full/cars/1.jpg"></div>
        </body></html>"#
    )
}
