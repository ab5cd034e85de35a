//! Process Lock File Module
//!
//! Keeps two daemons from rewriting the same event log. The store lock only
//! serializes writers inside one process.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// PID lock file held for the lifetime of the daemon.
#[derive(Debug)]
pub struct ProcessLock {
    lock_path: PathBuf,
    owned: bool,
}

impl ProcessLock {
    const LOCK_FILE_NAME: &'static str = ".hostmend.lock";

    /// Acquire the lock inside `data_dir`, creating the directory if needed.
    ///
    /// Fails if a live hostmend process already holds it. A lock left by a
    /// dead process is removed.
    pub fn acquire<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        let lock_path = data_dir.join(Self::LOCK_FILE_NAME);

        if lock_path.exists() {
            match Self::holder_pid(&lock_path) {
                Ok(Some(pid)) => {
                    bail!(
                        "Another hostmend instance is already running (PID: {})\n\
                         If it is not, remove the stale lock file: rm {:?}",
                        pid,
                        lock_path
                    );
                }
                Ok(None) => {
                    tracing::info!(path = ?lock_path, "Removing stale lock file");
                    fs::remove_file(&lock_path).context("Failed to remove stale lock file")?;
                }
                Err(e) => {
                    tracing::warn!("Unreadable lock file, replacing it: {:#}", e);
                    let _ = fs::remove_file(&lock_path);
                }
            }
        }

        let pid = std::process::id();
        fs::write(&lock_path, format!("{}\n", pid))
            .with_context(|| format!("Failed to write lock file: {:?}", lock_path))?;

        tracing::debug!(pid, path = ?lock_path, "Acquired process lock");

        Ok(Self {
            lock_path,
            owned: true,
        })
    }

    /// `Some(pid)` while the recorded process is a running hostmend.
    fn holder_pid(lock_path: &Path) -> Result<Option<u32>> {
        let contents = fs::read_to_string(lock_path).context("Failed to read lock file")?;
        let pid: u32 = contents
            .trim()
            .parse()
            .context("Failed to parse PID from lock file")?;

        if pid != std::process::id() && Self::is_hostmend_running(pid) {
            Ok(Some(pid))
        } else {
            Ok(None)
        }
    }

    #[cfg(target_os = "linux")]
    fn is_hostmend_running(pid: u32) -> bool {
        fs::read(format!("/proc/{}/cmdline", pid))
            .map(|cmdline| String::from_utf8_lossy(&cmdline).contains("hostmend"))
            .unwrap_or(false)
    }

    #[cfg(not(target_os = "linux"))]
    fn is_hostmend_running(_pid: u32) -> bool {
        true
    }

    /// Remove the lock file. Also runs on drop.
    pub fn release(&mut self) {
        if self.owned {
            if let Err(e) = fs::remove_file(&self.lock_path) {
                tracing::warn!("Failed to remove lock file: {}", e);
            } else {
                tracing::debug!(path = ?self.lock_path, "Released process lock");
            }
            self.owned = false;
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_acquire_writes_own_pid() {
        let temp_dir = tempdir().unwrap();
        let lock = ProcessLock::acquire(temp_dir.path().join("data")).unwrap();

        let contents = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(contents.trim().parse::<u32>().unwrap(), std::process::id());
    }

    #[test]
    fn test_lock_released_on_drop() {
        let temp_dir = tempdir().unwrap();
        let lock_path = {
            let lock = ProcessLock::acquire(temp_dir.path()).unwrap();
            lock.path().to_path_buf()
        };
        assert!(!lock_path.exists());
    }

    #[test]
    fn test_stale_lock_replaced() {
        let temp_dir = tempdir().unwrap();
        let lock_path = temp_dir.path().join(ProcessLock::LOCK_FILE_NAME);
        fs::write(&lock_path, "999999999\n").unwrap();

        let lock = ProcessLock::acquire(temp_dir.path()).unwrap();
        let contents = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(contents.trim().parse::<u32>().unwrap(), std::process::id());
    }

    #[test]
    fn test_garbage_lock_replaced() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join(ProcessLock::LOCK_FILE_NAME), "not a pid").unwrap();
        assert!(ProcessLock::acquire(temp_dir.path()).is_ok());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_live_holder_blocks_acquire() {
        let temp_dir = tempdir().unwrap();
        // argv[0] of the shell names hostmend, like a running daemon
        let mut holder = std::process::Command::new("sh")
            .args(["-c", "sleep 10; true", "hostmend"])
            .spawn()
            .unwrap();
        let lock_path = temp_dir.path().join(ProcessLock::LOCK_FILE_NAME);
        fs::write(&lock_path, format!("{}\n", holder.id())).unwrap();

        let err = ProcessLock::acquire(temp_dir.path()).unwrap_err();
        assert!(err.to_string().contains(&holder.id().to_string()));
        assert!(lock_path.exists(), "holder's lock must be left in place");

        holder.kill().unwrap();
        holder.wait().unwrap();
        assert!(ProcessLock::acquire(temp_dir.path()).is_ok());
    }
}
