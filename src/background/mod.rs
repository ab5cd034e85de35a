//! Background services - the monitoring control loop
//!
//! Runs as a tokio task that samples the host every interval, raises alerts
//! and hands stopped services and resource pressure to the healing engine.

pub mod control_loop;
pub mod cycle;

pub use control_loop::ControlLoop;
pub use cycle::{CycleReport, MonitorCycle, MonitorStatus};
