//! Control Loop - fixed-interval driver for [`MonitorCycle`]
//!
//! Each tick runs one cycle on the blocking pool, then hands the cycle's
//! alerts to the notifier. Cancellation is only observed between cycles,
//! so a shutdown never cuts a restart or an event append short.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::cycle::MonitorCycle;
use crate::notify::Notifier;

pub struct ControlLoop {
    cycle: Arc<Mutex<MonitorCycle>>,
    notifier: Arc<Notifier>,
    interval: Duration,
}

impl ControlLoop {
    pub fn new(cycle: MonitorCycle, notifier: Arc<Notifier>, interval: Duration) -> Self {
        Self {
            cycle: Arc::new(Mutex::new(cycle)),
            notifier,
            interval,
        }
    }

    /// Run until `cancel` fires. Writes the `start` and `shutdown` events.
    pub async fn run(self, cancel: CancellationToken) {
        info!(interval_secs = self.interval.as_secs(), "Control loop started");
        self.blocking(|c| c.start()).await;

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.tick().await;
        }

        self.blocking(|c| c.shutdown()).await;
        info!("Control loop stopped");
    }

    /// A single cycle bracketed by the `start` and `shutdown` events.
    pub async fn run_single(self) {
        self.blocking(|c| c.start()).await;
        self.tick().await;
        self.blocking(|c| c.shutdown()).await;
    }

    /// One cycle plus notifications.
    pub async fn tick(&self) {
        let result = self.blocking(|c| c.run_once()).await;
        match result {
            Some(Ok(report)) => {
                for alert in &report.alerts {
                    let _ = self.notifier.notify(alert).await;
                }
            }
            Some(Err(e)) => warn!(error = %e, "Cycle skipped"),
            None => {}
        }
    }

    /// Run `f` against the cycle on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut MonitorCycle) -> T + Send + 'static,
    {
        let cycle = self.cycle.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let mut guard = cycle.lock().unwrap_or_else(|e| {
                warn!("Monitor cycle lock poisoned, recovering");
                PoisonError::into_inner(e)
            });
            f(&mut guard)
        })
        .await;
        match joined {
            Ok(value) => Some(value),
            Err(e) => {
                error!("Monitoring task panicked: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HostmendConfig, NotificationConfig};
    use crate::healing::{HealingEngine, RemediationError, RemediationOutcome, RemediationStatus, Remediator};
    use crate::monitoring::{ControllerError, MetricsError, MetricsProvider, RestartOutput, ServiceController};
    use crate::storage::{EventBody, EventStore, SystemEventType};
    use crate::types::MetricSnapshot;
    use serde_json::Map;

    struct Steady;

    impl MetricsProvider for Steady {
        fn sample(&mut self) -> Result<MetricSnapshot, MetricsError> {
            Ok(MetricSnapshot::default())
        }
    }

    struct Running;

    impl ServiceController for Running {
        fn is_active(&self, _s: &str, _t: Duration) -> Result<bool, ControllerError> {
            Ok(true)
        }

        fn restart(&self, _s: &str, _t: Duration) -> Result<RestartOutput, ControllerError> {
            Ok(RestartOutput::default())
        }
    }

    struct Idle;

    impl Remediator for Idle {
        fn clear_cache(&mut self) -> Result<RemediationOutcome, RemediationError> {
            Ok(RemediationOutcome::new(RemediationStatus::NoAction, "", Map::new()))
        }

        fn kill_top_memory_consumer(&mut self, _f: f64) -> Result<RemediationOutcome, RemediationError> {
            Ok(RemediationOutcome::new(RemediationStatus::NoAction, "", Map::new()))
        }

        fn sweep_temp_files(&mut self) -> Result<RemediationOutcome, RemediationError> {
            Ok(RemediationOutcome::new(RemediationStatus::NoAction, "", Map::new()))
        }
    }

    #[tokio::test]
    async fn test_runs_until_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(EventStore::open(dir.path().join("monitoring.json")).unwrap());
        let mut config = HostmendConfig::default();
        config.monitoring.services = vec!["cron".into()];
        let config = Arc::new(config);

        let controller: Arc<dyn ServiceController> = Arc::new(Running);
        let engine = HealingEngine::new(
            config.healing.clone(),
            controller.clone(),
            Box::new(Idle),
            store.clone(),
        );
        let cycle = MonitorCycle::new(config, Box::new(Steady), controller, engine, store.clone());
        let status = cycle.status_handle();
        let notifier = Arc::new(Notifier::new(&NotificationConfig::default(), Vec::new()));
        let control = ControlLoop::new(cycle, notifier, Duration::from_millis(20));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(control.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(150)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(status.read().unwrap().cycles >= 2);

        let events = store.read_all().unwrap();
        let first = &events[0].body;
        let last = &events[events.len() - 1].body;
        assert!(matches!(
            first,
            EventBody::System { system_event_type: SystemEventType::Start, .. }
        ));
        assert!(matches!(
            last,
            EventBody::System { system_event_type: SystemEventType::Shutdown, .. }
        ));
    }
}
