//! Healing Policy Engine
//!
//! Per service the engine tracks consecutive failed restarts:
//!
//! - `0`: healthy
//! - `1..max`: retrying; each stopped observation triggers another restart
//! - `max`: exhausted; restarts are refused until [`HealingEngine::reset_attempts`],
//!   or until a reset queued on [`ResetRequests`] is applied at the start of
//!   the next cycle
//!
//! A restart only counts as successful once the liveness re-check after the
//! settle delay reports the unit active. Timeouts, non-zero exits and
//! "restarted but still inactive" all advance the counter.
//!
//! Host remediation is threshold-triggered every cycle with no cooldown.
//! Every invoked action becomes exactly one action event in the store.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use super::remediator::{RemediationOutcome, RemediationStatus, Remediator};
use super::RemediationError;
use crate::config::HealingConfig;
use crate::monitoring::ServiceController;
use crate::storage::{Event, EventStore};
use crate::types::{ActionType, AlertType, HealingAction, MetricSnapshot, ServiceStatusMap};

/// Read-only counters published for the API and statistics events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealingStats {
    pub successful_restarts: u64,
    pub failed_restarts: u64,
    pub aborted_restarts: u64,
    /// Current consecutive-failure count per service
    pub restart_attempts: BTreeMap<String, u32>,
    pub cleanup_actions: u64,
    pub cache_clears: u64,
    pub process_kills: u64,
    pub remediation_failures: u64,
}

impl HealingStats {
    pub fn total_actions(&self) -> u64 {
        self.successful_restarts
            + self.failed_restarts
            + self.aborted_restarts
            + self.cleanup_actions
            + self.cache_clears
            + self.process_kills
            + self.remediation_failures
    }
}

/// Attempt resets requested from outside the control loop.
///
/// The engine stays the only writer of its counters: requests are queued
/// here and applied by [`HealingEngine::evaluate_and_heal`].
#[derive(Debug, Clone, Default)]
pub struct ResetRequests(Arc<Mutex<BTreeSet<String>>>);

impl ResetRequests {
    pub fn request(&self, service: &str) {
        self.lock().insert(service.to_string());
    }

    pub fn pending(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }

    fn take(&self) -> BTreeSet<String> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
        self.0.lock().unwrap_or_else(|e| {
            warn!("Reset queue lock poisoned, recovering");
            PoisonError::into_inner(e)
        })
    }
}

/// Outcome of one restart attempt before it is turned into an action.
enum RestartResult {
    Confirmed,
    StillInactive(String),
    Failed(String),
}

pub struct HealingEngine {
    config: HealingConfig,
    controller: Arc<dyn ServiceController>,
    remediator: Box<dyn Remediator>,
    store: Arc<EventStore>,
    attempts: HashMap<String, u32>,
    stats: Arc<RwLock<HealingStats>>,
    resets: ResetRequests,
}

impl HealingEngine {
    pub fn new(
        config: HealingConfig,
        controller: Arc<dyn ServiceController>,
        remediator: Box<dyn Remediator>,
        store: Arc<EventStore>,
    ) -> Self {
        Self {
            config,
            controller,
            remediator,
            store,
            attempts: HashMap::new(),
            stats: Arc::new(RwLock::new(HealingStats::default())),
            resets: ResetRequests::default(),
        }
    }

    /// Shared handle to the counters (for API endpoints)
    pub fn stats_handle(&self) -> Arc<RwLock<HealingStats>> {
        self.stats.clone()
    }

    /// Queue used by the API to clear a service's attempts.
    pub fn reset_handle(&self) -> ResetRequests {
        self.resets.clone()
    }

    pub fn stats(&self) -> HealingStats {
        self.stats
            .read()
            .unwrap_or_else(|e| {
                warn!("Healing stats lock poisoned, recovering");
                PoisonError::into_inner(e)
            })
            .clone()
    }

    /// Consecutive failed restarts recorded for `service`.
    pub fn attempts(&self, service: &str) -> u32 {
        self.attempts.get(service).copied().unwrap_or(0)
    }

    /// Clear the failure count so an exhausted service is restarted again.
    pub fn reset_attempts(&mut self, service: &str) {
        if self.attempts.remove(service).is_some() {
            info!(service, "Restart attempts reset");
        }
        self.update_stats(|s| {
            s.restart_attempts.remove(service);
        });
    }

    /// Run one cycle of healing: stopped services in name order, then the
    /// cpu, memory and disk triggers.
    pub fn evaluate_and_heal(
        &mut self,
        snapshot: &MetricSnapshot,
        services: &ServiceStatusMap,
    ) -> Vec<HealingAction> {
        for service in self.resets.take() {
            self.reset_attempts(&service);
        }

        if !self.config.enabled {
            debug!("Healing disabled, skipping");
            return Vec::new();
        }

        let mut actions = Vec::new();
        for (name, running) in services {
            if !running {
                actions.push(self.heal_service(name));
            }
        }

        if snapshot.cpu_pct > self.config.auto_heal_cpu_pct {
            info!(cpu_pct = snapshot.cpu_pct, "CPU above auto-heal threshold, clearing caches");
            actions.push(self.remediate(ActionType::ClearCache, AlertType::HighCpu, |r| {
                r.clear_cache()
            }));
        }

        if snapshot.memory_pct > self.config.auto_heal_memory_pct {
            info!(
                memory_pct = snapshot.memory_pct,
                "Memory above auto-heal threshold, killing top consumer"
            );
            let floor = self.config.kill_floor_pct;
            actions.push(self.remediate(ActionType::KillProcess, AlertType::HighMemory, |r| {
                r.kill_top_memory_consumer(floor)
            }));
        }

        if snapshot.disk_pct > self.config.auto_heal_disk_pct {
            info!(disk_pct = snapshot.disk_pct, "Disk above auto-heal threshold, sweeping temp files");
            actions.push(self.remediate(
                ActionType::CleanupTempFiles,
                AlertType::LowDisk,
                |r| r.sweep_temp_files(),
            ));
        }

        actions
    }

    /// Handle one stopped observation of `service`.
    pub fn heal_service(&mut self, service: &str) -> HealingAction {
        let max = self.config.max_restart_attempts;
        let prior = self.attempts(service);

        if prior >= max {
            warn!(
                service,
                attempts = prior,
                max_attempts = max,
                "Restart attempts exhausted, not restarting"
            );
            self.update_stats(|s| s.aborted_restarts += 1);
            let action = HealingAction {
                action_type: ActionType::ServiceRestartAborted,
                trigger: AlertType::ServiceDown,
                target: Some(service.to_string()),
                success: false,
                message: format!(
                    "Restart of {} skipped: {} consecutive failures (max {})",
                    service, prior, max
                ),
                details: details(json!({
                    "status": "aborted",
                    "attempts": prior,
                    "max_attempts": max,
                })),
                timestamp: Utc::now(),
            };
            self.record(&action);
            return action;
        }

        let attempt = prior + 1;
        info!(service, attempt, max_attempts = max, "Restarting service");

        let (success, message, status_label, error_text) = match self.try_restart(service) {
            RestartResult::Confirmed => {
                self.attempts.remove(service);
                info!(service, "Service restarted and active");
                (
                    true,
                    format!("Service {} restarted", service),
                    "success",
                    None,
                )
            }
            RestartResult::StillInactive(reason) => {
                self.attempts.insert(service.to_string(), attempt.min(max));
                warn!(service, attempt, "Restart command succeeded but service is inactive");
                (
                    false,
                    format!(
                        "Service {} restarted but still inactive (attempt {}/{})",
                        service, attempt, max
                    ),
                    "partial_success",
                    Some(reason),
                )
            }
            RestartResult::Failed(reason) => {
                self.attempts.insert(service.to_string(), attempt.min(max));
                error!(service, attempt, error = %reason, "Service restart failed");
                (
                    false,
                    format!(
                        "Restart of {} failed (attempt {}/{}): {}",
                        service, attempt, max, reason
                    ),
                    "failed",
                    Some(reason),
                )
            }
        };

        let now_attempts = self.attempts(service);
        self.update_stats(|s| {
            if success {
                s.successful_restarts += 1;
                s.restart_attempts.remove(service);
            } else {
                s.failed_restarts += 1;
                s.restart_attempts.insert(service.to_string(), now_attempts);
            }
        });

        let mut action_details = details(json!({
            "status": status_label,
            "attempt": attempt,
            "max_attempts": max,
        }));
        if let Some(reason) = error_text {
            action_details.insert("error".into(), Value::String(reason));
        }

        let action = HealingAction {
            action_type: ActionType::ServiceRestart,
            trigger: AlertType::ServiceDown,
            target: Some(service.to_string()),
            success,
            message,
            details: action_details,
            timestamp: Utc::now(),
        };
        self.record(&action);
        action
    }

    fn try_restart(&self, service: &str) -> RestartResult {
        match self.controller.restart(service, self.config.restart_timeout()) {
            Err(e) => return RestartResult::Failed(e.to_string()),
            Ok(out) if !out.success => {
                let reason = if out.stderr.is_empty() {
                    "restart command exited with an error".to_string()
                } else {
                    out.stderr
                };
                return RestartResult::Failed(reason);
            }
            Ok(_) => {}
        }

        let settle = self.config.settle_delay();
        if !settle.is_zero() {
            std::thread::sleep(settle);
        }

        match self.controller.is_active(service, self.config.status_timeout()) {
            Ok(true) => RestartResult::Confirmed,
            Ok(false) => RestartResult::StillInactive("service inactive after restart".to_string()),
            Err(e) => RestartResult::StillInactive(format!("liveness check failed: {}", e)),
        }
    }

    fn remediate<F>(&mut self, action_type: ActionType, trigger: AlertType, run: F) -> HealingAction
    where
        F: FnOnce(&mut dyn Remediator) -> Result<RemediationOutcome, RemediationError>,
    {
        let action = match run(self.remediator.as_mut()) {
            Ok(outcome) => {
                let status = outcome.status;
                self.update_stats(|s| match action_type {
                    ActionType::CleanupTempFiles => s.cleanup_actions += 1,
                    ActionType::ClearCache if outcome.success => s.cache_clears += 1,
                    ActionType::KillProcess if status == RemediationStatus::Success => {
                        s.process_kills += 1
                    }
                    _ if status == RemediationStatus::Failed => s.remediation_failures += 1,
                    _ => {}
                });
                info!(
                    action = %action_type,
                    trigger = %trigger,
                    status = status.as_str(),
                    "{}",
                    outcome.message
                );
                HealingAction {
                    action_type,
                    trigger,
                    target: None,
                    success: outcome.success,
                    message: outcome.message,
                    details: outcome.details,
                    timestamp: Utc::now(),
                }
            }
            Err(e) => {
                error!(action = %action_type, trigger = %trigger, error = %e, "Remediation failed");
                self.update_stats(|s| s.remediation_failures += 1);
                HealingAction {
                    action_type,
                    trigger,
                    target: None,
                    success: false,
                    message: format!("{} failed: {}", action_type, e),
                    details: details(json!({
                        "status": RemediationStatus::Failed.as_str(),
                        "error": e.to_string(),
                    })),
                    timestamp: Utc::now(),
                }
            }
        };
        self.record(&action);
        action
    }

    /// Append the action event. Storage failures never stop healing.
    fn record(&self, action: &HealingAction) {
        if let Err(e) = self.store.append(Event::action(action)) {
            error!(action = %action.action_type, error = %e, "Failed to record action event");
        }
    }

    fn update_stats(&self, f: impl FnOnce(&mut HealingStats)) {
        let mut stats = self.stats.write().unwrap_or_else(|e| {
            warn!("Healing stats lock poisoned, recovering");
            PoisonError::into_inner(e)
        });
        f(&mut stats);
    }
}

fn details(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::{ControllerError, RestartOutput};
    use crate::storage::EventBody;
    use crate::types::ActionStatus;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted controller: each restart pops the next (restart, liveness) pair.
    #[derive(Default)]
    struct ScriptedController {
        script: Mutex<VecDeque<(Result<bool, ()>, bool)>>,
        restarts: Mutex<u32>,
        pending_liveness: Mutex<bool>,
    }

    impl ScriptedController {
        fn with(script: Vec<(Result<bool, ()>, bool)>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                ..Self::default()
            })
        }

        fn restarts(&self) -> u32 {
            *self.restarts.lock().unwrap()
        }
    }

    impl ServiceController for ScriptedController {
        fn is_active(&self, _service: &str, _timeout: Duration) -> Result<bool, ControllerError> {
            Ok(*self.pending_liveness.lock().unwrap())
        }

        fn restart(&self, service: &str, timeout: Duration) -> Result<RestartOutput, ControllerError> {
            *self.restarts.lock().unwrap() += 1;
            let (restart, liveness) = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or((Ok(false), false));
            *self.pending_liveness.lock().unwrap() = liveness;
            match restart {
                Ok(success) => Ok(RestartOutput {
                    success,
                    stderr: if success { String::new() } else { "unit failed".into() },
                }),
                Err(()) => Err(ControllerError::Timeout {
                    operation: "restart",
                    service: service.to_string(),
                    secs: timeout.as_secs(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct CountingRemediator {
        calls: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl Remediator for CountingRemediator {
        fn clear_cache(&mut self) -> Result<RemediationOutcome, RemediationError> {
            self.calls.lock().unwrap().push("clear_cache");
            if self.fail {
                return Err(RemediationError::SyncFailed("read-only filesystem".into()));
            }
            Ok(RemediationOutcome::new(RemediationStatus::Success, "caches dropped", Map::new()))
        }

        fn kill_top_memory_consumer(&mut self, _floor: f64) -> Result<RemediationOutcome, RemediationError> {
            self.calls.lock().unwrap().push("kill");
            if self.fail {
                let mut details = Map::new();
                details.insert("process_pid".into(), json!(4242));
                return Ok(RemediationOutcome::new(RemediationStatus::Failed, "kill refused", details));
            }
            Ok(RemediationOutcome::new(RemediationStatus::Success, "killed", Map::new()))
        }

        fn sweep_temp_files(&mut self) -> Result<RemediationOutcome, RemediationError> {
            self.calls.lock().unwrap().push("sweep");
            Ok(RemediationOutcome::new(RemediationStatus::NoAction, "nothing to do", Map::new()))
        }
    }

    fn config() -> HealingConfig {
        HealingConfig {
            settle_delay_ms: 0,
            ..HealingConfig::default()
        }
    }

    fn engine(
        controller: Arc<ScriptedController>,
        remediator: CountingRemediator,
    ) -> (tempfile::TempDir, Arc<EventStore>, HealingEngine) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(EventStore::open(dir.path().join("monitoring.json")).unwrap());
        let engine = HealingEngine::new(config(), controller, Box::new(remediator), store.clone());
        (dir, store, engine)
    }

    fn stopped(name: &str) -> ServiceStatusMap {
        ServiceStatusMap::from([(name.to_string(), false)])
    }

    #[test]
    fn test_confirmed_restart_resets_counter() {
        let controller = ScriptedController::with(vec![(Ok(false), false), (Ok(true), true)]);
        let (_dir, _store, mut engine) = engine(controller.clone(), CountingRemediator::default());

        let first = engine.heal_service("cron");
        assert!(!first.success);
        assert_eq!(engine.attempts("cron"), 1);

        let second = engine.heal_service("cron");
        assert!(second.success);
        assert_eq!(second.action_type, ActionType::ServiceRestart);
        assert_eq!(engine.attempts("cron"), 0);
        assert_eq!(controller.restarts(), 2);

        let stats = engine.stats();
        assert_eq!(stats.successful_restarts, 1);
        assert_eq!(stats.failed_restarts, 1);
        assert!(stats.restart_attempts.is_empty());
    }

    #[test]
    fn test_inactive_after_restart_is_partial_success() {
        let controller = ScriptedController::with(vec![(Ok(true), false)]);
        let (_dir, _store, mut engine) = engine(controller, CountingRemediator::default());

        let action = engine.heal_service("ssh");
        assert!(!action.success);
        assert_eq!(action.details["status"], json!("partial_success"));
        assert_eq!(engine.attempts("ssh"), 1);
    }

    #[test]
    fn test_exhaustion_refuses_without_controller_call() {
        let controller = ScriptedController::with(vec![(Err(()), false); 3]);
        let (_dir, store, mut engine) = engine(controller.clone(), CountingRemediator::default());

        for _ in 0..3 {
            let a = engine.heal_service("dbus");
            assert_eq!(a.action_type, ActionType::ServiceRestart);
            assert!(a.message.contains("timed out"));
        }
        assert_eq!(engine.attempts("dbus"), 3);

        let aborted = engine.heal_service("dbus");
        assert_eq!(aborted.action_type, ActionType::ServiceRestartAborted);
        assert_eq!(aborted.status(), ActionStatus::Failed);
        assert_eq!(controller.restarts(), 3);
        assert_eq!(engine.attempts("dbus"), 3);
        assert_eq!(engine.stats().aborted_restarts, 1);

        // Four action events, nothing else
        assert_eq!(store.read_all().unwrap().len(), 4);
    }

    #[test]
    fn test_reset_reenables_restarts() {
        let controller = ScriptedController::with(vec![(Ok(false), false), (Ok(true), true)]);
        let (_dir, _store, mut engine) = engine(controller.clone(), CountingRemediator::default());
        engine.config.max_restart_attempts = 1;

        let _ = engine.heal_service("cron");
        assert_eq!(
            engine.heal_service("cron").action_type,
            ActionType::ServiceRestartAborted
        );

        engine.reset_attempts("cron");
        assert_eq!(engine.attempts("cron"), 0);
        assert!(engine.heal_service("cron").success);
        assert_eq!(controller.restarts(), 2);
    }

    #[test]
    fn test_queued_reset_applied_on_next_cycle() {
        let controller = ScriptedController::with(vec![(Ok(false), false), (Ok(true), true)]);
        let (_dir, _store, mut engine) = engine(controller.clone(), CountingRemediator::default());
        engine.config.max_restart_attempts = 1;
        let resets = engine.reset_handle();

        let _ = engine.evaluate_and_heal(&MetricSnapshot::default(), &stopped("cron"));
        let actions = engine.evaluate_and_heal(&MetricSnapshot::default(), &stopped("cron"));
        assert_eq!(actions[0].action_type, ActionType::ServiceRestartAborted);

        resets.request("cron");
        assert_eq!(resets.pending(), vec!["cron".to_string()]);
        assert_eq!(engine.attempts("cron"), 1, "nothing applied until the next cycle");

        let actions = engine.evaluate_and_heal(&MetricSnapshot::default(), &stopped("cron"));
        assert!(actions[0].success);
        assert_eq!(engine.attempts("cron"), 0);
        assert!(resets.pending().is_empty());
        assert_eq!(controller.restarts(), 2);
    }

    #[test]
    fn test_counters_are_per_service() {
        let controller = ScriptedController::with(vec![(Ok(false), false), (Ok(true), true)]);
        let (_dir, _store, mut engine) = engine(controller, CountingRemediator::default());

        let services = ServiceStatusMap::from([
            ("alpha".to_string(), false),
            ("beta".to_string(), false),
            ("gamma".to_string(), true),
        ]);
        let actions = engine.evaluate_and_heal(&MetricSnapshot::default(), &services);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].target.as_deref(), Some("alpha"));
        assert_eq!(engine.attempts("alpha"), 1);
        assert_eq!(engine.attempts("beta"), 0);
        assert_eq!(engine.attempts("gamma"), 0);
    }

    #[test]
    fn test_running_service_leaves_counter() {
        let controller = ScriptedController::with(vec![(Ok(false), false)]);
        let (_dir, _store, mut engine) = engine(controller.clone(), CountingRemediator::default());

        let _ = engine.evaluate_and_heal(&MetricSnapshot::default(), &stopped("cron"));
        let running = ServiceStatusMap::from([("cron".to_string(), true)]);
        let actions = engine.evaluate_and_heal(&MetricSnapshot::default(), &running);
        assert!(actions.is_empty());
        assert_eq!(engine.attempts("cron"), 1);
        assert_eq!(controller.restarts(), 1);
    }

    #[test]
    fn test_system_triggers_strictly_above_threshold() {
        let remediator = CountingRemediator::default();
        let calls = remediator.calls.clone();
        let (_dir, _store, mut engine) = engine(ScriptedController::with(vec![]), remediator);

        let at = MetricSnapshot {
            cpu_pct: 90.0,
            memory_pct: 95.0,
            disk_pct: 95.0,
            ..MetricSnapshot::default()
        };
        assert!(engine.evaluate_and_heal(&at, &ServiceStatusMap::new()).is_empty());

        let above = MetricSnapshot {
            cpu_pct: 90.5,
            memory_pct: 95.5,
            disk_pct: 96.0,
            ..MetricSnapshot::default()
        };
        let actions = engine.evaluate_and_heal(&above, &ServiceStatusMap::new());
        let kinds: Vec<_> = actions.iter().map(|a| (a.action_type, a.trigger)).collect();
        assert_eq!(
            kinds,
            vec![
                (ActionType::ClearCache, AlertType::HighCpu),
                (ActionType::KillProcess, AlertType::HighMemory),
                (ActionType::CleanupTempFiles, AlertType::LowDisk),
            ]
        );
        assert_eq!(*calls.lock().unwrap(), vec!["clear_cache", "kill", "sweep"]);

        let stats = engine.stats();
        assert_eq!(stats.cache_clears, 1);
        assert_eq!(stats.process_kills, 1);
        assert_eq!(stats.cleanup_actions, 1);
    }

    #[test]
    fn test_failed_kill_outcome_counted_and_recorded() {
        let remediator = CountingRemediator {
            fail: true,
            ..CountingRemediator::default()
        };
        let (_dir, store, mut engine) = engine(ScriptedController::with(vec![]), remediator);

        let snap = MetricSnapshot {
            memory_pct: 99.0,
            ..MetricSnapshot::default()
        };
        let actions = engine.evaluate_and_heal(&snap, &ServiceStatusMap::new());
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, ActionType::KillProcess);
        assert!(!actions[0].success);

        let stats = engine.stats();
        assert_eq!(stats.process_kills, 0);
        assert_eq!(stats.remediation_failures, 1);

        match &store.read_all().unwrap()[0].body {
            EventBody::Action { status, details, .. } => {
                assert_eq!(*status, ActionStatus::Failed);
                assert_eq!(details["process_pid"], json!(4242));
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_remediation_error_recorded_as_failed_action() {
        let remediator = CountingRemediator {
            fail: true,
            ..CountingRemediator::default()
        };
        let (_dir, store, mut engine) = engine(ScriptedController::with(vec![]), remediator);

        let snap = MetricSnapshot {
            cpu_pct: 99.0,
            ..MetricSnapshot::default()
        };
        let actions = engine.evaluate_and_heal(&snap, &ServiceStatusMap::new());
        assert_eq!(actions.len(), 1);
        assert!(!actions[0].success);
        assert!(actions[0].message.contains("read-only filesystem"));
        assert_eq!(engine.stats().remediation_failures, 1);

        let events = store.read_all().unwrap();
        match &events[0].body {
            EventBody::Action { status, details, .. } => {
                assert_eq!(*status, ActionStatus::Failed);
                assert_eq!(details["status"], json!("failed"));
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_disabled_healing_does_nothing() {
        let controller = ScriptedController::with(vec![]);
        let (_dir, store, mut engine) = engine(controller.clone(), CountingRemediator::default());
        engine.config.enabled = false;

        let snap = MetricSnapshot {
            cpu_pct: 99.0,
            ..MetricSnapshot::default()
        };
        assert!(engine.evaluate_and_heal(&snap, &stopped("cron")).is_empty());
        assert_eq!(controller.restarts(), 0);
        assert!(store.read_all().unwrap().is_empty());
    }
}
