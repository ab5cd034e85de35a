//! Threshold Evaluator
//!
//! Pure function from one cycle's observations to alerts. System alerts come
//! first (cpu, memory, disk, network), then one `service_down` per stopped
//! service in name order. Each rule is independent.

use crate::config::{AlertThresholds, SeverityLimits};
use crate::types::{Alert, AlertType, MetricSnapshot, ServiceStatusMap, Severity};

pub fn evaluate(
    snapshot: &MetricSnapshot,
    services: &ServiceStatusMap,
    thresholds: &AlertThresholds,
    limits: &SeverityLimits,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    let mut check = |alert_type: AlertType, value: f64, threshold: f64, critical_above: f64, unit: &str| {
        if value > threshold {
            let severity = if value > critical_above {
                Severity::Critical
            } else {
                Severity::Warning
            };
            alerts.push(Alert {
                alert_type,
                severity,
                value: Some(value),
                threshold: Some(threshold),
                service: None,
                message: format!(
                    "{} - {}: {:.1}{} (threshold: {:.1}{})",
                    severity,
                    alert_type.title(),
                    value,
                    unit,
                    threshold,
                    unit
                ),
                timestamp: snapshot.timestamp,
            });
        }
    };

    check(
        AlertType::HighCpu,
        snapshot.cpu_pct,
        thresholds.cpu_pct,
        limits.cpu_critical_pct,
        "%",
    );
    check(
        AlertType::HighMemory,
        snapshot.memory_pct,
        thresholds.memory_pct,
        limits.memory_critical_pct,
        "%",
    );
    check(
        AlertType::LowDisk,
        snapshot.disk_pct,
        thresholds.disk_pct,
        limits.disk_critical_pct,
        "%",
    );
    check(
        AlertType::HighNetwork,
        snapshot.net_total_mb(),
        thresholds.network_mb,
        thresholds.network_mb * limits.network_critical_multiplier,
        " MB",
    );

    // BTreeMap iteration is already name-ordered
    alerts.extend(services.iter().filter(|(_, running)| !**running).map(|(name, _)| Alert {
        alert_type: AlertType::ServiceDown,
        severity: Severity::Critical,
        value: None,
        threshold: None,
        service: Some(name.clone()),
        message: format!("{} - Service {} is stopped", Severity::Critical, name),
        timestamp: snapshot.timestamp,
    }));

    alerts
}
