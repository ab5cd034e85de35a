//! Metrics Provider - host CPU, memory, disk and network sampling

use std::ffi::CString;
use std::mem::MaybeUninit;

use chrono::Utc;
use sysinfo::{Networks, System};

use crate::types::MetricSnapshot;

const BYTES_PER_MB: f64 = 1_048_576.0;

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("disk usage unavailable for {path}: {reason}")]
    Disk { path: String, reason: String },
}

/// Source of one [`MetricSnapshot`] per cycle.
///
/// Network figures are deltas since the previous call, so implementations
/// keep state and take `&mut self`.
pub trait MetricsProvider: Send {
    fn sample(&mut self) -> Result<MetricSnapshot, MetricsError>;
}

/// `sysinfo` for CPU, memory and network; `statvfs` for disk.
pub struct SysinfoMetrics {
    system: System,
    networks: Networks,
    disk_path: String,
}

impl SysinfoMetrics {
    /// Primes CPU and network counters so the first sample has a baseline.
    pub fn new(disk_path: impl Into<String>) -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self {
            system,
            networks: Networks::new_with_refreshed_list(),
            disk_path: disk_path.into(),
        }
    }
}

impl MetricsProvider for SysinfoMetrics {
    fn sample(&mut self) -> Result<MetricSnapshot, MetricsError> {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();
        self.networks.refresh(true);

        let total_memory = self.system.total_memory();
        let memory_pct = if total_memory > 0 {
            self.system.used_memory() as f64 / total_memory as f64 * 100.0
        } else {
            0.0
        };

        let (sent, received) = self
            .networks
            .iter()
            .fold((0u64, 0u64), |(tx, rx), (_, data)| {
                (tx + data.transmitted(), rx + data.received())
            });

        Ok(MetricSnapshot {
            timestamp: Utc::now(),
            cpu_pct: round_to(f64::from(self.system.global_cpu_usage()), 1),
            memory_pct: round_to(memory_pct, 1),
            disk_pct: round_to(disk_usage_pct(&self.disk_path)?, 1),
            net_sent_mb: round_to(sent as f64 / BYTES_PER_MB, 2),
            net_recv_mb: round_to(received as f64 / BYTES_PER_MB, 2),
        })
    }
}

/// Used share of the filesystem holding `path`, as `df` reports it
/// (reserved blocks excluded from the total).
pub fn disk_usage_pct(path: &str) -> Result<f64, MetricsError> {
    let err = |reason: String| MetricsError::Disk {
        path: path.to_string(),
        reason,
    };

    let c_path = CString::new(path).map_err(|e| err(e.to_string()))?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();

    let result = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if result != 0 {
        return Err(err(std::io::Error::last_os_error().to_string()));
    }
    let stat = unsafe { stat.assume_init() };

    let frsize = stat.f_frsize as f64;
    let used = (stat.f_blocks as f64 - stat.f_bfree as f64) * frsize;
    let available = stat.f_bavail as f64 * frsize;
    if used + available <= 0.0 {
        return Ok(0.0);
    }
    Ok(used / (used + available) * 100.0)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(95.04, 1), 95.0);
    }

    #[test]
    fn test_root_disk_usage_in_range() {
        let pct = disk_usage_pct("/").unwrap();
        assert!((0.0..=100.0).contains(&pct));
    }

    #[test]
    fn test_missing_mount_is_error() {
        assert!(disk_usage_pct("/nonexistent/hostmend/mount").is_err());
    }

    #[test]
    fn test_sysinfo_sample_in_range() {
        let mut metrics = SysinfoMetrics::new("/");
        let snap = metrics.sample().unwrap();
        assert!((0.0..=100.0).contains(&snap.cpu_pct));
        assert!((0.0..=100.0).contains(&snap.memory_pct));
        assert!(snap.net_sent_mb >= 0.0 && snap.net_recv_mb >= 0.0);
    }
}
