//! State module for tracking monitor progress
//!
//! # Components
//!
//! - `MonitorState`: the phase the monitor loop is in (idle, one of the cycle
//!   phases, sleeping, or stopped)

mod monitor_state;

pub use monitor_state::MonitorState;
