//! Process table access for the memory-pressure kill.

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind, Users};

use super::RemediationError;

/// One running process as seen by the kill policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    /// Resident memory as a share of physical memory (0-100)
    pub memory_pct: f64,
    pub user: Option<String>,
    pub uid: Option<u32>,
}

/// Enumerate and hard-kill processes.
pub trait ProcessTable: Send {
    fn snapshot(&mut self) -> Vec<ProcessInfo>;

    /// SIGKILL `pid`.
    fn kill(&mut self, pid: u32) -> Result<(), RemediationError>;
}

/// Which processes may never be chosen.
#[derive(Debug, Clone)]
pub struct KillPolicy<'a> {
    pub floor_pct: f64,
    pub protected_users: &'a [String],
    pub protected_names: &'a [String],
    pub own_pid: u32,
}

impl KillPolicy<'_> {
    fn is_protected(&self, p: &ProcessInfo) -> bool {
        p.pid == self.own_pid
            || p.pid <= 1
            || p.uid == Some(0)
            || p
                .user
                .as_deref()
                .map_or(false, |u| self.protected_users.iter().any(|pu| pu == u))
            || self.protected_names.iter().any(|n| n == &p.name)
            || p.name.starts_with("kworker")
    }
}

/// The single highest-memory unprotected process above the floor.
pub fn select_kill_candidate<'p>(
    processes: &'p [ProcessInfo],
    policy: &KillPolicy<'_>,
) -> Option<&'p ProcessInfo> {
    processes
        .iter()
        .filter(|p| p.memory_pct > policy.floor_pct && !policy.is_protected(p))
        .max_by(|a, b| a.memory_pct.total_cmp(&b.memory_pct))
}

/// Live process table backed by `sysinfo`.
pub struct SysinfoProcessTable {
    system: System,
    users: Users,
}

impl SysinfoProcessTable {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            users: Users::new_with_refreshed_list(),
        }
    }
}

impl Default for SysinfoProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessTable for SysinfoProcessTable {
    fn snapshot(&mut self) -> Vec<ProcessInfo> {
        self.system.refresh_memory();
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing()
                .with_memory()
                .with_user(UpdateKind::OnlyIfNotSet),
        );
        self.users.refresh();

        let total = self.system.total_memory();
        if total == 0 {
            return Vec::new();
        }

        self.system
            .processes()
            .iter()
            .map(|(pid, process)| {
                let uid = process.user_id();
                ProcessInfo {
                    pid: pid.as_u32(),
                    name: process.name().to_string_lossy().into_owned(),
                    memory_pct: process.memory() as f64 / total as f64 * 100.0,
                    user: uid
                        .and_then(|uid| self.users.get_user_by_id(uid))
                        .map(|u| u.name().to_string()),
                    uid: uid.map(|uid| **uid),
                }
            })
            .collect()
    }

    fn kill(&mut self, pid: u32) -> Result<(), RemediationError> {
        let process = self
            .system
            .process(Pid::from_u32(pid))
            .ok_or(RemediationError::ProcessGone { pid })?;
        if process.kill() {
            Ok(())
        } else {
            Err(RemediationError::KillRefused {
                pid,
                name: process.name().to_string_lossy().into_owned(),
            })
        }
    }
}
