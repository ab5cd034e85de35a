//! One monitoring cycle: sample, evaluate, heal, record.
//!
//! Synchronous by construction; restarts and `sync` block for seconds, so
//! the async runner drives it from `spawn_blocking`.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::config::HostmendConfig;
use crate::healing::{HealingEngine, HealingStats, ResetRequests};
use crate::monitoring::{collect_statuses, evaluate, MetricsError, MetricsProvider, ServiceController};
use crate::storage::{Event, EventStore, SystemEventType};
use crate::types::{Alert, HealingAction, MetricSnapshot, ServiceStatusMap};

/// Latest observations, published for the dashboard API.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub started_at: DateTime<Utc>,
    pub cycles: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub snapshot: Option<MetricSnapshot>,
    pub services: ServiceStatusMap,
    pub alerts: Vec<Alert>,
    pub actions: Vec<HealingAction>,
    pub last_error: Option<String>,
}

impl Default for MonitorStatus {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            cycles: 0,
            last_cycle_at: None,
            snapshot: None,
            services: ServiceStatusMap::new(),
            alerts: Vec::new(),
            actions: Vec::new(),
            last_error: None,
        }
    }
}

/// Everything one cycle observed and did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub snapshot: MetricSnapshot,
    pub services: ServiceStatusMap,
    pub alerts: Vec<Alert>,
    pub actions: Vec<HealingAction>,
}

pub struct MonitorCycle {
    config: Arc<HostmendConfig>,
    metrics: Box<dyn MetricsProvider>,
    controller: Arc<dyn ServiceController>,
    engine: HealingEngine,
    store: Arc<EventStore>,
    cycles: u64,
    status: Arc<RwLock<MonitorStatus>>,
}

impl MonitorCycle {
    pub fn new(
        config: Arc<HostmendConfig>,
        metrics: Box<dyn MetricsProvider>,
        controller: Arc<dyn ServiceController>,
        engine: HealingEngine,
        store: Arc<EventStore>,
    ) -> Self {
        Self {
            config,
            metrics,
            controller,
            engine,
            store,
            cycles: 0,
            status: Arc::new(RwLock::new(MonitorStatus::default())),
        }
    }

    /// Shared handle to the latest observations (for API endpoints)
    pub fn status_handle(&self) -> Arc<RwLock<MonitorStatus>> {
        self.status.clone()
    }

    pub fn stats_handle(&self) -> Arc<RwLock<HealingStats>> {
        self.engine.stats_handle()
    }

    pub fn reset_handle(&self) -> ResetRequests {
        self.engine.reset_handle()
    }

    pub fn engine_mut(&mut self) -> &mut HealingEngine {
        &mut self.engine
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Record the `start` system event.
    pub fn start(&self) {
        let m = &self.config.monitoring;
        let t = &self.config.thresholds;
        info!(
            interval_secs = m.interval_secs,
            services = m.services.len(),
            healing = self.config.healing.enabled,
            "Monitoring started"
        );
        self.record(Event::system(
            SystemEventType::Start,
            "Monitoring started",
            to_map(json!({
                "interval_secs": m.interval_secs,
                "services": m.services,
                "thresholds": {
                    "cpu_pct": t.cpu_pct,
                    "memory_pct": t.memory_pct,
                    "disk_pct": t.disk_pct,
                    "network_mb": t.network_mb,
                },
                "healing_enabled": self.config.healing.enabled,
            })),
        ));
    }

    /// Record the `shutdown` system event with final counters.
    pub fn shutdown(&self) {
        let stats = self.engine.stats();
        info!(cycles = self.cycles, actions = stats.total_actions(), "Monitoring stopped");
        let mut details = self.statistics_details(&stats);
        details.insert("cycles".into(), Value::from(self.cycles));
        self.record(Event::system(
            SystemEventType::Shutdown,
            format!("Monitoring stopped after {} cycles", self.cycles),
            details,
        ));
    }

    /// Run one full cycle.
    ///
    /// Only sampling can fail the cycle; that is recorded as an `error`
    /// system event and returned.
    pub fn run_once(&mut self) -> Result<CycleReport, MetricsError> {
        self.cycles += 1;
        let cycle = self.cycles;
        debug!(cycle, "Monitoring cycle");
        self.record(Event::system(
            SystemEventType::MonitoringCycle,
            format!("Monitoring cycle #{}", cycle),
            to_map(json!({ "cycle": cycle })),
        ));

        let snapshot = match self.metrics.sample() {
            Ok(s) => s,
            Err(e) => {
                error!(cycle, error = %e, "Metric sampling failed");
                self.record(Event::system(
                    SystemEventType::Error,
                    format!("Cycle #{} failed: {}", cycle, e),
                    to_map(json!({ "cycle": cycle, "error": e.to_string() })),
                ));
                self.update_status(|s| {
                    s.cycles = cycle;
                    s.last_cycle_at = Some(Utc::now());
                    s.last_error = Some(e.to_string());
                });
                return Err(e);
            }
        };

        let services = collect_statuses(
            self.controller.as_ref(),
            &self.config.monitoring.services,
            self.config.healing.status_timeout(),
        );

        self.record(Event::system_metrics(&snapshot));
        for (name, running) in &services {
            self.record(Event::service_status(name, *running));
        }

        let alerts = evaluate(
            &snapshot,
            &services,
            &self.config.thresholds,
            &self.config.severity,
        );
        for alert in &alerts {
            warn!(alert = %alert.alert_type, severity = %alert.severity, "{}", alert.message);
            self.record(Event::alert(alert));
        }

        let actions = self.engine.evaluate_and_heal(&snapshot, &services);

        let every = self.config.monitoring.statistics_every_cycles.max(1);
        if cycle % every == 0 {
            let stats = self.engine.stats();
            let mut details = self.statistics_details(&stats);
            details.insert("cycle".into(), Value::from(cycle));
            self.record(Event::system(
                SystemEventType::Statistics,
                format!("Statistics after {} cycles", cycle),
                details,
            ));
        }

        self.update_status(|s| {
            s.cycles = cycle;
            s.last_cycle_at = Some(Utc::now());
            s.snapshot = Some(snapshot.clone());
            s.services = services.clone();
            s.alerts = alerts.clone();
            s.actions = actions.clone();
            s.last_error = None;
        });

        Ok(CycleReport {
            cycle,
            snapshot,
            services,
            alerts,
            actions,
        })
    }

    fn statistics_details(&self, stats: &HealingStats) -> Map<String, Value> {
        let mut details = Map::new();
        details.insert(
            "healing".into(),
            serde_json::to_value(stats).unwrap_or(Value::Null),
        );
        details.insert("total_actions".into(), Value::from(stats.total_actions()));
        details
    }

    fn record(&self, event: Event) {
        if let Err(e) = self.store.append(event) {
            error!(error = %e, "Failed to append event");
        }
    }

    fn update_status(&self, f: impl FnOnce(&mut MonitorStatus)) {
        let mut status = self.status.write().unwrap_or_else(|e| {
            warn!("Monitor status lock poisoned, recovering");
            PoisonError::into_inner(e)
        });
        f(&mut status);
    }
}

fn to_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
