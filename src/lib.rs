//! hostmend: host health monitoring with bounded auto-healing
//!
//! Samples CPU, memory, disk, network and systemd service state on a fixed
//! interval, raises threshold alerts and remediates a bounded set of
//! failures. Every decision lands in a durable JSON event log.
//!
//! ## Architecture
//!
//! - **Monitoring**: metric sampling, service status and the threshold evaluator
//! - **Healing**: per-service restart policy plus host remediation (cache
//!   clear, memory-pressure kill, temp-file sweep)
//! - **Storage**: the corruption-tolerant, atomically rewritten event log
//! - **Background**: the control loop tying the above together
//! - **Notify** / **API**: alert delivery and the read-only dashboard API

pub mod api;
pub mod background;
pub mod config;
pub mod healing;
pub mod monitoring;
pub mod notify;
pub mod storage;
pub mod types;

pub use config::HostmendConfig;
pub use healing::{HealingEngine, HealingStats};
pub use storage::{AppendOutcome, Event, EventStore, StoreError};
pub use types::{
    ActionStatus, ActionType, Alert, AlertType, HealingAction, MetricSnapshot, ServiceStatusMap,
    Severity,
};
