//! Event records persisted in the JSON array log
//!
//! Every element of the log is one [`Event`]: a timestamp plus an
//! `event_type`-tagged body. The on-disk shape is flat, e.g.
//!
//! ```json
//! {"timestamp": "...", "event_type": "action", "action_type": "clear_cache",
//!  "status": "SUCCESS", "trigger": "high_cpu", "service": null,
//!  "message": "System caches dropped", "details": {"status": "success"}}
//! ```

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::types::{
    ActionStatus, ActionType, Alert, AlertType, HealingAction, MetricSnapshot, Severity,
};

/// One persisted log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub body: EventBody,
}

/// Kind-specific event fields, tagged by `event_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventBody {
    Metric {
        metric_type: MetricType,
        values: Map<String, Value>,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    Alert {
        alert_type: AlertType,
        severity: Severity,
        message: String,
        #[serde(default)]
        details: Map<String, Value>,
    },
    Action {
        action_type: ActionType,
        status: ActionStatus,
        #[serde(default)]
        trigger: Option<AlertType>,
        #[serde(default)]
        service: Option<String>,
        message: String,
        #[serde(default)]
        details: Map<String, Value>,
    },
    System {
        system_event_type: SystemEventType,
        message: String,
        #[serde(default)]
        details: Map<String, Value>,
    },
}

/// Metric event flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    /// Host resource sample
    System,
    /// One service's running state
    ServiceStatus,
}

/// Lifecycle events written by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemEventType {
    Start,
    MonitoringCycle,
    Statistics,
    Shutdown,
    Error,
}

/// Coarse event category, used for filtering reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Metric,
    Alert,
    Action,
    System,
}

impl EventCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Alert => "alert",
            Self::Action => "action",
            Self::System => "system",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metric" => Ok(Self::Metric),
            "alert" => Ok(Self::Alert),
            "action" => Ok(Self::Action),
            "system" => Ok(Self::System),
            other => Err(format!(
                "unknown event kind '{other}' (expected metric, alert, action or system)"
            )),
        }
    }
}

impl Event {
    /// Event stamped with the current time.
    pub fn now(body: EventBody) -> Self {
        Self {
            timestamp: Utc::now(),
            body,
        }
    }

    /// Host metric sample.
    pub fn system_metrics(snapshot: &MetricSnapshot) -> Self {
        let values = json!({
            "cpu_percent": snapshot.cpu_pct,
            "memory_percent": snapshot.memory_pct,
            "disk_percent": snapshot.disk_pct,
            "network_sent_mb": snapshot.net_sent_mb,
            "network_recv_mb": snapshot.net_recv_mb,
            "total_network_mb": snapshot.net_total_mb(),
        });
        let mut metadata = Map::new();
        metadata.insert(
            "sampled_at".into(),
            Value::String(snapshot.timestamp.to_rfc3339()),
        );
        Self::now(EventBody::Metric {
            metric_type: MetricType::System,
            values: into_map(values),
            metadata,
        })
    }

    /// One service's state for this cycle.
    pub fn service_status(service: &str, running: bool) -> Self {
        let values = json!({
            "service": service,
            "status": if running { "active" } else { "inactive" },
        });
        Self::now(EventBody::Metric {
            metric_type: MetricType::ServiceStatus,
            values: into_map(values),
            metadata: Map::new(),
        })
    }

    pub fn alert(alert: &Alert) -> Self {
        Self {
            timestamp: alert.timestamp,
            body: EventBody::Alert {
                alert_type: alert.alert_type,
                severity: alert.severity,
                message: alert.message.clone(),
                details: alert.details(),
            },
        }
    }

    pub fn action(action: &HealingAction) -> Self {
        Self {
            timestamp: action.timestamp,
            body: EventBody::Action {
                action_type: action.action_type,
                status: action.status(),
                trigger: Some(action.trigger),
                service: action.target.clone(),
                message: action.message.clone(),
                details: action.details.clone(),
            },
        }
    }

    pub fn system(kind: SystemEventType, message: impl Into<String>, details: Map<String, Value>) -> Self {
        Self::now(EventBody::System {
            system_event_type: kind,
            message: message.into(),
            details,
        })
    }

    pub const fn category(&self) -> EventCategory {
        match self.body {
            EventBody::Metric { .. } => EventCategory::Metric,
            EventBody::Alert { .. } => EventCategory::Alert,
            EventBody::Action { .. } => EventCategory::Action,
            EventBody::System { .. } => EventCategory::System,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match &self.body {
            EventBody::Metric { .. } => None,
            EventBody::Alert { message, .. }
            | EventBody::Action { message, .. }
            | EventBody::System { message, .. } => Some(message),
        }
    }

    pub(crate) fn message_mut(&mut self) -> Option<&mut String> {
        match &mut self.body {
            EventBody::Metric { .. } => None,
            EventBody::Alert { message, .. }
            | EventBody::Action { message, .. }
            | EventBody::System { message, .. } => Some(message),
        }
    }
}

/// Parse an RFC 3339 timestamp, or a zone-less ISO 8601 one taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
}

/// Unwrap a `json!` object literal.
fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
