//! What a monitor cycle produces and what its status looks like

use crate::model::ListingRecord;
use crate::state::MonitorState;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of one check cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// 1-based cycle number within this process
    pub cycle: u64,

    pub started_at: DateTime<Utc>,

    /// Listings found on the results page
    pub found: usize,

    /// Listings not seen before, in page order
    pub new_records: Vec<ListingRecord>,

    /// True for the first-run pass that records the inventory silently
    pub baseline: bool,
}

impl CycleReport {
    /// A report for a cycle that produced nothing (failed or cancelled)
    pub fn empty(cycle: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            cycle,
            started_at,
            found: 0,
            new_records: Vec::new(),
            baseline: false,
        }
    }

    pub fn new_count(&self) -> usize {
        self.new_records.len()
    }
}

/// Point-in-time view of a monitor, for foreground surfaces
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub state: MonitorState,
    pub target_url: String,
    pub cycles_completed: u64,
    pub last_check_at: Option<DateTime<Utc>>,
    pub last_new_count: usize,
    pub total_new: u64,
    pub known_ids: usize,
    pub cached_details: usize,
}

/// Counters updated at the end of every cycle
#[derive(Debug, Clone, Default)]
pub(crate) struct Progress {
    pub cycles_completed: u64,
    pub last_check_at: Option<DateTime<Utc>>,
    pub last_new_count: usize,
    pub total_new: u64,
}

impl Progress {
    pub fn record(&mut self, report: &CycleReport) {
        self.cycles_completed += 1;
        self.last_check_at = Some(report.started_at);
        self.last_new_count = report.new_count();
        self.total_new += report.new_count() as u64;
    }
}
