//! Full check cycles against a mock site

use super::{detail_page, fast_fetcher, fast_fetcher_config, listing_page};
use carwatch::config::MonitorConfig;
use carwatch::storage::{AppendLogStore, JsonFileStore};
use carwatch::{DetailCache, Ledger, Monitor, MonitorState};
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_listing(mock_server: &MockServer, ids: &[&str], times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path("/autos"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(ids)));
    let mock = match times {
        Some(n) => mock.up_to_n_times(n),
        None => mock,
    };
    mock.mount(mock_server).await;
}

async fn mount_detail(mock_server: &MockServer, id: &str, expected_fetches: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/autos/{}-toyota-camry", id)))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_page("Bakı")))
        .expect(expected_fetches)
        .mount(mock_server)
        .await;
}

fn monitor_config(mock_server: &MockServer, baseline: bool) -> MonitorConfig {
    let mut config = MonitorConfig::new(format!("{}/autos", mock_server.uri()));
    config.baseline_on_first_run = baseline;
    config
}

fn in_memory_monitor(config: MonitorConfig) -> Monitor {
    Monitor::with_parts(
        config,
        fast_fetcher(fast_fetcher_config()),
        DetailCache::in_memory(),
        Ledger::in_memory(),
    )
}

#[tokio::test]
async fn test_new_listings_reported_once() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, &["101", "202"], None).await;
    mount_detail(&mock_server, "101", 1).await;
    mount_detail(&mock_server, "202", 1).await;

    let monitor = in_memory_monitor(monitor_config(&mock_server, false));

    let first = monitor.check_once().await;
    assert!(!first.baseline);
    assert_eq!(first.found, 2);
    assert_eq!(first.new_count(), 2);
    assert_eq!(first.new_records[0].id(), "101");
    assert_eq!(first.new_records[0].details.city, "Bakı");
    assert_eq!(first.new_records[0].stub.year, "2018");
    assert!(first.new_records[0].stub.thumbnail.starts_with("http://"));

    // Details come from the cache; the detail mocks expect a single hit each
    let second = monitor.check_once().await;
    assert_eq!(second.found, 2);
    assert_eq!(second.new_count(), 0);

    let status = monitor.handle().status();
    assert_eq!(status.cycles_completed, 2);
    assert_eq!(status.total_new, 2);
    assert_eq!(status.known_ids, 2);
    assert_eq!(status.cached_details, 2);
    assert_eq!(status.state, MonitorState::Sleeping);
}

#[tokio::test]
async fn test_baseline_then_new_listing() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, &["101", "202"], Some(1)).await;
    mount_listing(&mock_server, &["303", "101", "202"], None).await;
    mount_detail(&mock_server, "101", 1).await;
    mount_detail(&mock_server, "202", 1).await;
    mount_detail(&mock_server, "303", 1).await;

    let monitor = in_memory_monitor(monitor_config(&mock_server, true));
    assert!(monitor.needs_baseline());

    let baseline = monitor.check_once().await;
    assert!(baseline.baseline);
    assert_eq!(baseline.found, 2);
    assert_eq!(baseline.new_count(), 0);
    assert!(!monitor.needs_baseline());

    let next = monitor.check_once().await;
    assert!(!next.baseline);
    assert_eq!(next.found, 3);
    assert_eq!(next.new_count(), 1);
    assert_eq!(next.new_records[0].id(), "303");
}

#[tokio::test]
async fn test_state_survives_restart() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, &["101", "202"], None).await;
    mount_detail(&mock_server, "101", 1).await;
    mount_detail(&mock_server, "202", 1).await;

    let dir = tempdir().unwrap();
    let cache_path = dir.path().join("car_details_cache.json");
    let ledger_path = dir.path().join("known_cars.txt");

    let open_monitor = || {
        Monitor::with_parts(
            monitor_config(&mock_server, true),
            fast_fetcher(fast_fetcher_config()),
            DetailCache::open(Box::new(JsonFileStore::open(&cache_path).unwrap())),
            Ledger::open(Box::new(AppendLogStore::open(&ledger_path).unwrap())),
        )
    };

    {
        let monitor = open_monitor();
        let report = monitor.check_once().await;
        assert!(report.baseline);
    }

    let monitor = open_monitor();
    assert!(!monitor.needs_baseline());

    let report = monitor.check_once().await;
    assert!(!report.baseline);
    assert_eq!(report.found, 2);
    assert_eq!(report.new_count(), 0);
    assert_eq!(monitor.handle().status().cached_details, 2);
}

#[tokio::test]
async fn test_failed_detail_fetch_keeps_stub() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, &["101"], None).await;

    Mock::given(method("GET"))
        .and(path("/autos/101-toyota-camry"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let monitor = in_memory_monitor(monitor_config(&mock_server, false));

    let report = monitor.check_once().await;

    assert_eq!(report.new_count(), 1);
    let record = &report.new_records[0];
    assert_eq!(record.stub.title, "Toyota Camry 101");
    assert!(record.details.is_empty());
    assert_eq!(monitor.handle().status().cached_details, 0);
}

#[tokio::test]
async fn test_stop_during_extraction_commits_partial_batch() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, &["101", "202", "303"], None).await;

    Mock::given(method("GET"))
        .and(path("/autos/101-toyota-camry"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(detail_page("Gəncə"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&mock_server)
        .await;
    mount_detail(&mock_server, "202", 0).await;
    mount_detail(&mock_server, "303", 0).await;

    let monitor = in_memory_monitor(monitor_config(&mock_server, false));
    let handle = monitor.handle();

    let (report, _) = tokio::join!(monitor.check_once(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop();
    });

    assert_eq!(report.found, 3);
    assert_eq!(report.new_count(), 1);
    assert_eq!(report.new_records[0].details.city, "Gəncə");

    let status = handle.status();
    assert_eq!(status.known_ids, 1);

    // A stopped monitor starts no further cycles
    let skipped = monitor.check_once().await;
    assert_eq!(skipped.found, 0);
    assert_eq!(handle.status().cycles_completed, 1);
}

#[tokio::test]
async fn test_run_delivers_reports_until_stopped() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, &["101"], None).await;
    mount_detail(&mock_server, "101", 1).await;

    let monitor = in_memory_monitor(monitor_config(&mock_server, false));
    let handle = monitor.handle();
    let (tx, mut rx) = mpsc::channel(4);

    let runner = tokio::spawn(monitor.run(Some(tx)));

    let report = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("no report within 10s")
        .expect("channel closed");
    assert_eq!(report.cycle, 1);
    assert_eq!(report.new_count(), 1);

    // The monitor is now sleeping out its 600s interval; stop cuts it short
    handle.stop();
    tokio::time::timeout(Duration::from_secs(10), runner)
        .await
        .expect("monitor did not stop")
        .unwrap();

    assert_eq!(handle.state(), MonitorState::Stopped);
    assert_eq!(handle.status().cycles_completed, 1);
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_notifications_disabled_sends_nothing() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, &["101"], None).await;
    mount_detail(&mock_server, "101", 1).await;

    let mut config = monitor_config(&mock_server, false);
    config.notifications_enabled = false;
    let monitor = in_memory_monitor(config);
    let handle = monitor.handle();
    let (tx, mut rx) = mpsc::channel(4);

    let runner = tokio::spawn(monitor.run(Some(tx)));

    // Wait for the first cycle to finish
    tokio::time::timeout(Duration::from_secs(10), async {
        while handle.status().cycles_completed == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("first cycle did not finish");

    handle.stop();
    runner.await.unwrap();

    assert_eq!(handle.status().known_ids, 1);
    assert!(rx.recv().await.is_none());
}
