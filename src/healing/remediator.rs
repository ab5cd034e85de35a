//! System Remediator - host-level corrective actions
//!
//! Three actions, each reporting `(success, message, details)`:
//! cache clear for CPU pressure, killing the top memory consumer, and a
//! temp-file sweep for low disk.

use std::fs;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::process::Command;
use tracing::{info, warn};

use super::processes::{select_kill_candidate, KillPolicy, ProcessTable};
use super::sweep;
use super::RemediationError;
use crate::config::defaults::SYNC_TIMEOUT_SECS;
use crate::config::HealingConfig;
use crate::monitoring::command::run_with_timeout;

/// Outcome label carried in `details.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationStatus {
    Success,
    NoAction,
    NotSupported,
    Failed,
}

impl RemediationStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NoAction => "no_action",
            Self::NotSupported => "not_supported",
            Self::Failed => "failed",
        }
    }
}

/// Result of a remediation that ran to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct RemediationOutcome {
    pub status: RemediationStatus,
    pub success: bool,
    pub message: String,
    pub details: Map<String, Value>,
}

impl RemediationOutcome {
    pub fn new(status: RemediationStatus, message: impl Into<String>, mut details: Map<String, Value>) -> Self {
        details.insert("status".into(), Value::from(status.as_str()));
        Self {
            status,
            success: status != RemediationStatus::Failed,
            message: message.into(),
            details,
        }
    }
}

/// Host-level remediation used by the healing engine.
///
/// `Err` means the action could not be carried out; the engine records it
/// as a failed action.
pub trait Remediator: Send {
    fn clear_cache(&mut self) -> Result<RemediationOutcome, RemediationError>;

    fn kill_top_memory_consumer(&mut self, floor_pct: f64) -> Result<RemediationOutcome, RemediationError>;

    fn sweep_temp_files(&mut self) -> Result<RemediationOutcome, RemediationError>;
}

/// Remediator acting on the local host.
pub struct HostRemediator {
    config: HealingConfig,
    processes: Box<dyn ProcessTable>,
}

impl HostRemediator {
    pub fn new(config: HealingConfig, processes: Box<dyn ProcessTable>) -> Self {
        Self { config, processes }
    }
}

fn to_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / 1_048_576.0 * 100.0).round() / 100.0
}

impl Remediator for HostRemediator {
    fn clear_cache(&mut self) -> Result<RemediationOutcome, RemediationError> {
        let out = run_with_timeout(Command::new("sync"), Duration::from_secs(SYNC_TIMEOUT_SECS))?;
        if !out.success() {
            return Err(RemediationError::SyncFailed(out.stderr.trim().to_string()));
        }

        let control = &self.config.drop_caches_path;
        let details = to_map(json!({ "control": control.display().to_string() }));
        if !control.exists() {
            info!(control = %control.display(), "Cache drop not supported on this host");
            return Ok(RemediationOutcome::new(
                RemediationStatus::NotSupported,
                "Buffers synced; cache drop not supported on this host",
                details,
            ));
        }

        fs::write(control, "3").map_err(|source| RemediationError::Io {
            path: control.clone(),
            source,
        })?;
        info!("Page, dentry and inode caches dropped");
        Ok(RemediationOutcome::new(
            RemediationStatus::Success,
            "System caches dropped",
            details,
        ))
    }

    fn kill_top_memory_consumer(&mut self, floor_pct: f64) -> Result<RemediationOutcome, RemediationError> {
        let processes = self.processes.snapshot();
        let policy = KillPolicy {
            floor_pct,
            protected_users: &self.config.protected_users,
            protected_names: &self.config.protected_processes,
            own_pid: std::process::id(),
        };

        let target = match select_kill_candidate(&processes, &policy) {
            Some(p) => p.clone(),
            None => {
                info!(floor_pct, "No process above the memory floor");
                return Ok(RemediationOutcome::new(
                    RemediationStatus::NoAction,
                    format!("No killable process above {:.1}% memory", floor_pct),
                    to_map(json!({ "floor_pct": floor_pct })),
                ));
            }
        };

        warn!(
            pid = target.pid,
            name = %target.name,
            memory_pct = target.memory_pct,
            "Killing top memory consumer"
        );
        let mut details = to_map(json!({
            "process_name": target.name,
            "process_pid": target.pid,
            "memory_usage": (target.memory_pct * 10.0).round() / 10.0,
            "user": target.user,
        }));

        if let Err(e) = self.processes.kill(target.pid) {
            warn!(pid = target.pid, name = %target.name, error = %e, "Kill failed");
            details.insert("error".into(), Value::String(e.to_string()));
            return Ok(RemediationOutcome::new(
                RemediationStatus::Failed,
                format!("Failed to kill process {} (PID {}): {}", target.name, target.pid, e),
                details,
            ));
        }

        Ok(RemediationOutcome::new(
            RemediationStatus::Success,
            format!(
                "Process {} (PID {}) killed, {:.1}% memory",
                target.name, target.pid, target.memory_pct
            ),
            details,
        ))
    }

    fn sweep_temp_files(&mut self) -> Result<RemediationOutcome, RemediationError> {
        let report = sweep::sweep(
            &self.config.cleanup_paths,
            self.config.temp_file_max_age(),
            SystemTime::now(),
        );

        let cleaned_paths: Vec<Value> = report
            .cleaned
            .iter()
            .map(|p| {
                json!({
                    "path": p.path.display().to_string(),
                    "freed_mb": bytes_to_mb(p.freed_bytes),
                    "files_removed": p.files_removed,
                })
            })
            .collect();
        let freed_mb = bytes_to_mb(report.freed_bytes());
        let details = to_map(json!({
            "cleaned_paths": cleaned_paths,
            "freed_mb": freed_mb,
            "files_removed": report.files_removed(),
            "directories_scanned": report.directories_scanned,
        }));

        if report.cleaned.is_empty() {
            return Ok(RemediationOutcome::new(
                RemediationStatus::NoAction,
                "No temp files old enough to remove",
                details,
            ));
        }

        info!(freed_mb, files = report.files_removed(), "Temp files swept");
        Ok(RemediationOutcome::new(
            RemediationStatus::Success,
            format!(
                "Removed {} temp files, {:.2} MB freed",
                report.files_removed(),
                freed_mb
            ),
            details,
        ))
    }
}
