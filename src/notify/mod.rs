//! Alert notifications
//!
//! The control loop hands every alert to [`Notifier::notify`]. The notifier
//! drops alerts below the configured severity, rate-limits per dedup key
//! `(alert type, service)` and fans the message out to its sinks. Healing
//! never waits on or gates on notification.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

pub mod webhook;

pub use webhook::WebhookSink;

use crate::config::NotificationConfig;
use crate::types::{Alert, Severity};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook returned status {0}")]
    Status(reqwest::StatusCode),
}

/// A rendered alert, ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub dedup_key: String,
    pub severity: Severity,
}

impl Notification {
    pub fn from_alert(alert: &Alert, recipients: &[String]) -> Self {
        let subject = match &alert.service {
            Some(service) => format!("[{}] {}: {}", alert.severity, alert.alert_type.title(), service),
            None => format!("[{}] {}", alert.severity, alert.alert_type.title()),
        };

        let mut body = format!(
            "{}\n\nType: {}\nSeverity: {}\nTime: {}\n",
            alert.message,
            alert.alert_type,
            alert.severity,
            alert.timestamp.to_rfc3339()
        );
        if let (Some(value), Some(threshold)) = (alert.value, alert.threshold) {
            body.push_str(&format!("Value: {:.1}\nThreshold: {:.1}\n", value, threshold));
        }
        if let Some(service) = &alert.service {
            body.push_str(&format!("Service: {}\n", service));
        }

        Self {
            recipients: recipients.to_vec(),
            subject,
            body,
            dedup_key: alert.dedup_key(),
            severity: alert.severity,
        }
    }
}

/// Delivery channel for notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the diagnostic log.
#[derive(Debug, Default)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        warn!(
            key = %notification.dedup_key,
            recipients = notification.recipients.len(),
            "NOTIFY {}",
            notification.subject
        );
        Ok(())
    }
}

/// One open window per dedup key.
#[derive(Debug)]
pub struct CooldownGate {
    cooldown: Duration,
    last_sent: Mutex<HashMap<String, Instant>>,
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_sent: Mutex::new(HashMap::new()),
        }
    }

    /// Claim the window for `key` at `now`. `false` while a previous claim
    /// is younger than the cooldown.
    pub fn try_acquire(&self, key: &str, now: Instant) -> bool {
        let mut last_sent = self.last_sent.lock().unwrap_or_else(|e| {
            warn!("Cooldown lock poisoned, recovering");
            PoisonError::into_inner(e)
        });
        match last_sent.get(key) {
            Some(prev) if now.saturating_duration_since(*prev) < self.cooldown => false,
            _ => {
                last_sent.insert(key.to_string(), now);
                true
            }
        }
    }
}

pub struct Notifier {
    enabled: bool,
    min_severity: Severity,
    recipients: Vec<String>,
    gate: CooldownGate,
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl Notifier {
    pub fn new(config: &NotificationConfig, sinks: Vec<Box<dyn NotificationSink>>) -> Self {
        Self {
            enabled: config.enabled,
            min_severity: config.min_severity,
            recipients: config.recipients.clone(),
            gate: CooldownGate::new(Duration::from_secs(config.cooldown_secs)),
            sinks,
        }
    }

    /// Log sink plus a webhook sink when a URL is configured.
    pub fn from_config(config: &NotificationConfig) -> Result<Self, NotifyError> {
        let mut sinks: Vec<Box<dyn NotificationSink>> = vec![Box::new(LogSink)];
        if let Some(url) = config.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
            sinks.push(Box::new(WebhookSink::new(url)?));
        }
        info!(
            enabled = config.enabled,
            sinks = sinks.len(),
            min_severity = %config.min_severity,
            "Notifier configured"
        );
        Ok(Self::new(config, sinks))
    }

    /// Deliver `alert` if it passes the severity filter and cooldown.
    /// Returns whether at least one sink accepted it.
    pub async fn notify(&self, alert: &Alert) -> bool {
        if !self.enabled || alert.severity < self.min_severity {
            return false;
        }

        let key = alert.dedup_key();
        if !self.gate.try_acquire(&key, Instant::now()) {
            debug!(key = %key, "Notification suppressed by cooldown");
            return false;
        }

        let notification = Notification::from_alert(alert, &self.recipients);
        let mut delivered = false;
        for sink in &self.sinks {
            match sink.deliver(&notification).await {
                Ok(()) => delivered = true,
                Err(e) => warn!(sink = sink.name(), key = %key, "Notification delivery failed: {}", e),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlertType;
    use chrono::Utc;
    use std::sync::Arc;

    struct CountingSink(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl NotificationSink for CountingSink {
        fn name(&self) -> &str {
            "counting"
        }

        async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.0.lock().unwrap().push(notification.subject.clone());
            Ok(())
        }
    }

    fn alert(alert_type: AlertType, severity: Severity, service: Option<&str>) -> Alert {
        Alert {
            alert_type,
            severity,
            value: service.is_none().then_some(97.0),
            threshold: service.is_none().then_some(80.0),
            service: service.map(str::to_string),
            message: "test".into(),
            timestamp: Utc::now(),
        }
    }

    fn notifier() -> (Notifier, Arc<Mutex<Vec<String>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let config = NotificationConfig {
            enabled: true,
            ..NotificationConfig::default()
        };
        let notifier = Notifier::new(&config, vec![Box::new(CountingSink(sent.clone()))]);
        (notifier, sent)
    }

    #[test]
    fn test_gate_cooldown_window() {
        let gate = CooldownGate::new(Duration::from_secs(300));
        let t0 = Instant::now();
        assert!(gate.try_acquire("high_cpu", t0));
        assert!(!gate.try_acquire("high_cpu", t0 + Duration::from_secs(299)));
        assert!(gate.try_acquire("low_disk", t0 + Duration::from_secs(1)));
        assert!(gate.try_acquire("high_cpu", t0 + Duration::from_secs(300)));
    }

    #[tokio::test]
    async fn test_cooldown_keyed_by_type_and_service() {
        let (notifier, sent) = notifier();
        let cron = alert(AlertType::ServiceDown, Severity::Critical, Some("cron"));
        let ssh = alert(AlertType::ServiceDown, Severity::Critical, Some("ssh"));

        assert!(notifier.notify(&cron).await);
        assert!(!notifier.notify(&cron).await);
        assert!(notifier.notify(&ssh).await);
        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_warnings_filtered_by_default() {
        let (notifier, sent) = notifier();
        assert!(!notifier.notify(&alert(AlertType::HighCpu, Severity::Warning, None)).await);
        assert!(notifier.notify(&alert(AlertType::HighCpu, Severity::Critical, None)).await);
        assert_eq!(*sent.lock().unwrap(), vec!["[CRITICAL] High CPU".to_string()]);
    }

    #[tokio::test]
    async fn test_disabled_sends_nothing() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let notifier = Notifier::new(
            &NotificationConfig::default(),
            vec![Box::new(CountingSink(sent.clone()))],
        );
        assert!(!notifier.notify(&alert(AlertType::LowDisk, Severity::Critical, None)).await);
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_notification_body() {
        let n = Notification::from_alert(
            &alert(AlertType::ServiceDown, Severity::Critical, Some("cron")),
            &["ops@example.com".to_string()],
        );
        assert_eq!(n.subject, "[CRITICAL] Service Down: cron");
        assert_eq!(n.dedup_key, "service_down:cron");
        assert!(n.body.contains("Service: cron"));
        assert_eq!(n.recipients, vec!["ops@example.com".to_string()]);
    }
}
