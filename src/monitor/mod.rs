//! Monitor orchestration
//!
//! - `Monitor`: owns the pipeline and runs check cycles
//! - `MonitorHandle`: stop/status/target control from other tasks
//! - `CycleReport`: the new records a cycle produced

mod handle;
mod orchestrator;
mod report;

pub use handle::MonitorHandle;
pub use orchestrator::Monitor;
pub use report::{CycleReport, MonitorStatus};
