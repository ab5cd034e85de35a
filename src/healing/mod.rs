//! Auto-healing: restart policy for stopped services and host remediation
//!
//! [`HealingEngine`] owns the per-service restart counters and decides what
//! to do each cycle. [`Remediator`] carries out host-level actions.

use std::path::PathBuf;

pub mod engine;
pub mod processes;
pub mod remediator;
pub mod sweep;

pub use engine::{HealingEngine, HealingStats, ResetRequests};
pub use processes::{ProcessInfo, ProcessTable, SysinfoProcessTable};
pub use remediator::{HostRemediator, RemediationOutcome, RemediationStatus, Remediator};

use crate::monitoring::command::CommandError;

/// Why a remediation could not be carried out.
#[derive(Debug, thiserror::Error)]
pub enum RemediationError {
    #[error("filesystem sync failed: {0}")]
    Sync(#[from] CommandError),
    #[error("filesystem sync exited with error: {0}")]
    SyncFailed(String),
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("process {pid} exited before it could be killed")]
    ProcessGone { pid: u32 },
    #[error("kill of {name} (PID {pid}) was refused")]
    KillRefused { pid: u32, name: String },
}
