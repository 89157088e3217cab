//! The monitor loop
//!
//! One cycle: fetch the results page, extract stubs, enrich each stub with
//! its detail page (sequentially, through the shared scheduler), split the
//! batch against the ledger, commit the new ids, and hand the new records on.
//! A cycle that fails anywhere counts as a zero-new cycle; the loop itself
//! never ends on an error.

use crate::cache::DetailCache;
use crate::config::{Config, MonitorConfig};
use crate::crawler::{
    build_http_client, extract_listing_page, DetailExtractor, PageFetcher, RequestScheduler,
};
use crate::ledger::Ledger;
use crate::monitor::handle::{MonitorHandle, Shared};
use crate::monitor::report::CycleReport;
use crate::state::MonitorState;
use crate::storage::{open_store_or_memory, CACHE_TABLE, LEDGER_TABLE};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub struct Monitor {
    config: MonitorConfig,
    fetcher: Arc<PageFetcher>,
    details: DetailExtractor,
    shared: Arc<Shared>,
}

impl Monitor {
    /// Builds a monitor with its scheduler, HTTP client and stores from `config`
    ///
    /// Stores that cannot be opened are replaced by empty in-memory ones.
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let scheduler = Arc::new(RequestScheduler::new(config.scheduler.clone()));
        let client = build_http_client(&config.fetcher)?;
        let fetcher = Arc::new(PageFetcher::new(client, scheduler, config.fetcher.clone()));

        let storage = &config.storage;
        let cache = DetailCache::open(open_store_or_memory(
            storage.cache_backend,
            &storage.cache_path,
            CACHE_TABLE,
        ));
        let ledger = Ledger::open(open_store_or_memory(
            storage.ledger_backend,
            &storage.ledger_path,
            LEDGER_TABLE,
        ));

        Ok(Self::with_parts(config.monitor.clone(), fetcher, cache, ledger))
    }

    pub fn with_parts(
        config: MonitorConfig,
        fetcher: Arc<PageFetcher>,
        cache: DetailCache,
        ledger: Ledger,
    ) -> Self {
        let cache = Arc::new(Mutex::new(cache));
        let shared = Arc::new(Shared::new(
            config.target_url.clone(),
            Arc::clone(&cache),
            ledger,
        ));
        let details = DetailExtractor::new(Arc::clone(&fetcher), cache);

        Self {
            config,
            fetcher,
            details,
            shared,
        }
    }

    pub fn handle(&self) -> MonitorHandle {
        MonitorHandle::new(Arc::clone(&self.shared))
    }

    pub fn fetcher(&self) -> &Arc<PageFetcher> {
        &self.fetcher
    }

    /// True when the next cycle will record the inventory without reporting it
    pub fn needs_baseline(&self) -> bool {
        self.config.baseline_on_first_run && self.shared.ledger().is_first_run()
    }

    /// Runs one cycle and always returns a report
    ///
    /// Errors are logged and produce an empty report. The monitor ends in
    /// `Sleeping` either way, ready for the next cycle.
    pub async fn check_once(&self) -> CycleReport {
        let cycle = self.shared.progress().cycles_completed + 1;
        let started_at = Utc::now();

        if self.shared.stop_requested() {
            tracing::warn!("Monitor is stopping, skipping check");
            return CycleReport::empty(cycle, started_at);
        }

        let report = match self.run_cycle(cycle, started_at).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Error during check cycle {}: {}", cycle, e);
                CycleReport::empty(cycle, started_at)
            }
        };

        self.shared.progress().record(&report);
        self.shared.set_state(MonitorState::Sleeping);
        report
    }

    async fn run_cycle(
        &self,
        cycle: u64,
        started_at: chrono::DateTime<Utc>,
    ) -> crate::Result<CycleReport> {
        let baseline = self.needs_baseline();
        let target_url = self.shared.target_url();

        self.shared.set_state(MonitorState::Fetching);
        tracing::info!("Checking for new cars (cycle {}): {}", cycle, target_url);
        if baseline {
            tracing::info!("First run detected - establishing baseline");
        }

        let page = self.fetcher.fetch(&target_url).await?;

        self.shared.set_state(MonitorState::Extracting);
        let listing = extract_listing_page(&page);
        drop(page);
        let found = listing.stubs.len();
        tracing::info!(
            "Found {} car listings, extracting detailed information...",
            found
        );

        let mut records = Vec::with_capacity(found);
        for (i, stub) in listing.stubs.into_iter().enumerate() {
            if self.shared.stop_requested() {
                tracing::info!(
                    "Stop requested, ending extraction after {} of {} listings",
                    i,
                    found
                );
                break;
            }
            tracing::debug!("Processing car {}/{}: {}", i + 1, found, stub.title);
            records.push(self.details.extract_detail(stub).await);
        }

        self.flush_cache();

        self.shared.set_state(MonitorState::Partitioning);
        let partition = self
            .shared
            .ledger()
            .partition(records.iter().map(|record| record.id()));

        self.shared.set_state(MonitorState::Reporting);
        let committed = {
            let mut ledger = self.shared.ledger();
            if baseline {
                ledger.baseline(&partition.new_ids)
            } else {
                ledger.commit(&partition.new_ids)
            }
        };
        if let Err(e) = committed {
            tracing::error!("Could not persist known listings, continuing in memory: {}", e);
        }

        if baseline {
            return Ok(CycleReport {
                cycle,
                started_at,
                found,
                new_records: Vec::new(),
                baseline: true,
            });
        }

        let new_ids: HashSet<&str> = partition.new_ids.iter().map(String::as_str).collect();
        let new_records: Vec<_> = records
            .into_iter()
            .filter(|record| new_ids.contains(record.id()))
            .collect();

        if new_records.is_empty() {
            tracing::info!("No new cars found");
        } else {
            tracing::info!("Found {} new cars", new_records.len());
        }

        Ok(CycleReport {
            cycle,
            started_at,
            found,
            new_records,
            baseline: false,
        })
    }

    /// Runs cycles until stopped
    ///
    /// Non-baseline reports go to `reports` when notifications are enabled.
    /// The sleep between cycles ends early on `MonitorHandle::stop`.
    pub async fn run(self, reports: Option<mpsc::Sender<CycleReport>>) {
        tracing::info!(
            "Monitoring {} every {} seconds",
            self.shared.target_url(),
            self.config.check_interval_secs
        );

        while !self.shared.stop_requested() {
            let report = self.check_once().await;
            self.deliver(report, reports.as_ref()).await;

            if self.shared.stop_requested() {
                break;
            }

            let interval = self.config.check_interval();
            tracing::debug!("Next check in {} seconds", interval.as_secs());
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = self.shared.stopped() => {}
            }
        }

        self.flush_cache();
        self.shared.set_state(MonitorState::Stopped);
        tracing::info!("Monitor stopped");
    }

    fn flush_cache(&self) {
        let flushed = self.shared.cache().flush();
        if let Err(e) = flushed {
            tracing::warn!("Could not save detail cache: {}", e);
        }
    }

    async fn deliver(&self, report: CycleReport, reports: Option<&mpsc::Sender<CycleReport>>) {
        if report.baseline {
            return;
        }

        if !self.config.notifications_enabled {
            if report.new_count() > 0 {
                tracing::info!(
                    "Notifications disabled, {} new listings not sent",
                    report.new_count()
                );
            }
            return;
        }

        if let Some(sender) = reports {
            if sender.send(report).await.is_err() {
                tracing::warn!("Report receiver closed, dropping cycle report");
            }
        }
    }
}
