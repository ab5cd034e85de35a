//! Core data types shared across the monitor
//!
//! - [`MetricSnapshot`]: one host sample per control-loop cycle
//! - [`ServiceStatusMap`]: service name to running flag, rebuilt every cycle
//! - [`Alert`]: a transient threshold crossing, only persisted as an event
//! - [`HealingAction`]: the outcome of one remediation attempt

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Metrics
// ============================================================================

/// Host resource sample taken once per cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub timestamp: DateTime<Utc>,
    /// Global CPU utilisation (0-100)
    pub cpu_pct: f64,
    /// Used physical memory (0-100)
    pub memory_pct: f64,
    /// Used space on the monitored mount (0-100)
    pub disk_pct: f64,
    /// MB transmitted since the previous sample
    pub net_sent_mb: f64,
    /// MB received since the previous sample
    pub net_recv_mb: f64,
}

impl MetricSnapshot {
    /// Combined network traffic for the interval.
    pub fn net_total_mb(&self) -> f64 {
        self.net_sent_mb + self.net_recv_mb
    }
}

impl Default for MetricSnapshot {
    fn default() -> Self {
        Self {
            timestamp: Utc::now(),
            cpu_pct: 0.0,
            memory_pct: 0.0,
            disk_pct: 0.0,
            net_sent_mb: 0.0,
            net_recv_mb: 0.0,
        }
    }
}

/// Service name to running flag. Ordered by name so every consumer iterates
/// services in the same order.
pub type ServiceStatusMap = BTreeMap<String, bool>;

// ============================================================================
// Alerts
// ============================================================================

/// Alert classes raised by the threshold evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    HighCpu,
    HighMemory,
    LowDisk,
    HighNetwork,
    ServiceDown,
}

impl AlertType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HighCpu => "high_cpu",
            Self::HighMemory => "high_memory",
            Self::LowDisk => "low_disk",
            Self::HighNetwork => "high_network",
            Self::ServiceDown => "service_down",
        }
    }

    /// Human-readable title used in notification subjects.
    pub const fn title(self) -> &'static str {
        match self {
            Self::HighCpu => "High CPU",
            Self::HighMemory => "High Memory",
            Self::LowDisk => "Low Disk",
            Self::HighNetwork => "High Network",
            Self::ServiceDown => "Service Down",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity. Ordered so `Critical > Warning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A threshold crossing detected in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub severity: Severity,
    /// Observed value (absent for `service_down`)
    pub value: Option<f64>,
    /// Threshold that was crossed (absent for `service_down`)
    pub threshold: Option<f64>,
    /// Affected service, for `service_down` only
    pub service: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    /// Key used by the notifier cooldown: one window per alert class and service.
    pub fn dedup_key(&self) -> String {
        match &self.service {
            Some(service) => format!("{}:{}", self.alert_type, service),
            None => self.alert_type.to_string(),
        }
    }

    /// Alert fields carried in the `details` object of an alert event.
    pub fn details(&self) -> Map<String, Value> {
        let mut details = Map::new();
        details.insert("value".into(), self.value.map_or(Value::Null, Value::from));
        details.insert(
            "threshold".into(),
            self.threshold.map_or(Value::Null, Value::from),
        );
        details.insert(
            "service".into(),
            self.service.clone().map_or(Value::Null, Value::String),
        );
        details
    }
}

// ============================================================================
// Healing Actions
// ============================================================================

/// Kinds of remediation the engine can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    ServiceRestart,
    ServiceRestartAborted,
    ClearCache,
    KillProcess,
    CleanupTempFiles,
}

impl ActionType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServiceRestart => "service_restart",
            Self::ServiceRestartAborted => "service_restart_aborted",
            Self::ClearCache => "clear_cache",
            Self::KillProcess => "kill_process",
            Self::CleanupTempFiles => "cleanup_temp_files",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome label written to action events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionStatus {
    Success,
    Failed,
}

impl ActionStatus {
    pub const fn from_success(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::Failed
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Record of one invoked remediation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealingAction {
    pub action_type: ActionType,
    /// Condition that caused the action
    pub trigger: AlertType,
    /// Service name for restarts; `None` for host-level remediation
    pub target: Option<String>,
    pub success: bool,
    pub message: String,
    pub details: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl HealingAction {
    pub const fn status(&self) -> ActionStatus {
        ActionStatus::from_success(self.success)
    }
}
