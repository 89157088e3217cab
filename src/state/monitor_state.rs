/// Monitor state definitions
///
/// This module defines the phases a monitor moves through during its lifetime.
use serde::Serialize;
use std::fmt;

/// Represents the current phase of the monitor loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorState {
    /// Created, no cycle has started yet
    Idle,

    // ===== Cycle Phases =====
    /// Fetching the search-results page
    Fetching,

    /// Extracting stubs and detail pages
    Extracting,

    /// Splitting the batch into new and known ids
    Partitioning,

    /// Committing new ids and handing the report on
    Reporting,

    /// Waiting for the next cycle
    Sleeping,

    // ===== Terminal State =====
    /// Cancelled; no further cycle will start
    Stopped,
}

impl MonitorState {
    /// Returns true once the monitor has stopped for good
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Returns true while a cycle is in flight
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Fetching | Self::Extracting | Self::Partitioning | Self::Reporting
        )
    }

    /// Whether the loop may move from `self` to `next`
    ///
    /// Any state may move to `Stopped`, and a failed cycle may go straight
    /// to `Sleeping` from any busy phase.
    pub fn can_transition_to(&self, next: Self) -> bool {
        use MonitorState::*;

        if next == Stopped {
            return !self.is_terminal();
        }
        if next == Sleeping && self.is_busy() {
            return true;
        }

        matches!(
            (self, next),
            (Idle, Fetching)
                | (Fetching, Extracting)
                | (Extracting, Partitioning)
                | (Partitioning, Reporting)
                | (Reporting, Sleeping)
                | (Sleeping, Fetching)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Partitioning => "partitioning",
            Self::Reporting => "reporting",
            Self::Sleeping => "sleeping",
            Self::Stopped => "stopped",
        }
    }

    /// Parses the string form produced by `as_str`
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "fetching" => Some(Self::Fetching),
            "extracting" => Some(Self::Extracting),
            "partitioning" => Some(Self::Partitioning),
            "reporting" => Some(Self::Reporting),
            "sleeping" => Some(Self::Sleeping),
            "stopped" => Some(Self::Stopped),
            _ => None,
        }
    }

    pub fn all_states() -> [Self; 7] {
        [
            Self::Idle,
            Self::Fetching,
            Self::Extracting,
            Self::Partitioning,
            Self::Reporting,
            Self::Sleeping,
            Self::Stopped,
        ]
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
