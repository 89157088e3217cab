//! Page fetcher retry behaviour against a mock server

use super::{fast_fetcher, fast_fetcher_config, listing_page};
use carwatch::config::FetcherConfig;
use carwatch::crawler::{extract_stubs, FetchError};
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_server_errors_exhaust_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/autos"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&mock_server)
        .await;

    let fetcher = fast_fetcher(fast_fetcher_config());
    let url = format!("{}/autos", mock_server.uri());

    match fetcher.fetch(&url).await {
        Err(FetchError::Exhausted {
            attempts,
            last_error,
            ..
        }) => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("502"), "unexpected error: {}", last_error);
        }
        other => panic!("expected Exhausted, got {:?}", other.map(|p| p.url)),
    }

    assert_eq!(fetcher.scheduler().request_count(), 3);
}

#[tokio::test]
async fn test_rate_limit_rotates_identity_and_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/autos"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/autos"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&["101", "202"])))
        .mount(&mock_server)
        .await;

    let fetcher = fast_fetcher(fast_fetcher_config());
    let url = format!("{}/autos", mock_server.uri());

    let page = fetcher.fetch(&url).await.expect("fetch should recover from 429");

    assert!(fetcher.scheduler().rotations() >= 1);
    assert_eq!(fetcher.scheduler().request_count(), 2);
    assert_eq!(extract_stubs(&page).len(), 2);
}

#[tokio::test]
async fn test_implausible_body_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/autos"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Access denied"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/autos"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&["101"])))
        .mount(&mock_server)
        .await;

    let fetcher = fast_fetcher(fast_fetcher_config());
    let url = format!("{}/autos", mock_server.uri());

    let page = fetcher.fetch(&url).await.expect("second attempt should succeed");

    assert!(page.body.contains("products-i"));
    assert_eq!(fetcher.scheduler().request_count(), 2);
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/autos/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = fast_fetcher(fast_fetcher_config());
    let url = format!("{}/autos/missing", mock_server.uri());

    match fetcher.fetch(&url).await {
        Err(FetchError::Status { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected Status, got {:?}", other.map(|p| p.url)),
    }
}

#[tokio::test]
async fn test_invalid_url() {
    let fetcher = fast_fetcher(fast_fetcher_config());

    let result = fetcher.fetch("not a url").await;

    assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    assert_eq!(fetcher.scheduler().request_count(), 0);
}

#[tokio::test]
async fn test_timeout_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/autos"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page(&["101"]))
                .set_delay(Duration::from_secs(3)),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/autos"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&["101"])))
        .mount(&mock_server)
        .await;

    let fetcher = fast_fetcher(FetcherConfig {
        timeout_secs: 1,
        ..fast_fetcher_config()
    });
    let url = format!("{}/autos", mock_server.uri());

    let page = fetcher.fetch(&url).await.expect("second attempt should succeed");

    assert_eq!(fetcher.scheduler().request_count(), 2);
    assert_eq!(extract_stubs(&page).len(), 1);
}

#[tokio::test]
async fn test_connection_refused_exhausts_attempts() {
    // Nothing listens on port 1
    let fetcher = fast_fetcher(fast_fetcher_config());

    match fetcher.fetch("http://127.0.0.1:1/autos").await {
        Err(FetchError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected Exhausted, got {:?}", other.map(|p| p.url)),
    }

    assert_eq!(fetcher.scheduler().request_count(), 3);
}

#[tokio::test]
async fn test_rate_limit_without_retry_after_waits_fallback() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/autos"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/autos"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&["101"])))
        .mount(&mock_server)
        .await;

    let fetcher = fast_fetcher(FetcherConfig {
        retry_after_fallback_secs: 1,
        ..fast_fetcher_config()
    });
    let url = format!("{}/autos", mock_server.uri());

    let started = Instant::now();
    fetcher.fetch(&url).await.expect("fetch should recover from 429");

    assert!(started.elapsed() >= Duration::from_secs(1));
    assert!(fetcher.scheduler().rotations() >= 1);
    assert_eq!(fetcher.scheduler().request_count(), 2);
}
