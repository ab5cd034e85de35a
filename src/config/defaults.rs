//! System-wide default constants.
//!
//! Fixed timings and limits that are not worth exposing as config keys.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Service Controller
// ============================================================================

/// Upper bound for one `systemctl restart` call (seconds).
pub const RESTART_TIMEOUT_SECS: u64 = 30;

/// Upper bound for one `systemctl is-active` call (seconds).
pub const STATUS_TIMEOUT_SECS: u64 = 10;

/// Delay between a successful restart command and the liveness re-check (ms).
pub const SETTLE_DELAY_MS: u64 = 2_000;

// ============================================================================
// System Remediator
// ============================================================================

/// Upper bound for the filesystem `sync` before dropping caches (seconds).
pub const SYNC_TIMEOUT_SECS: u64 = 10;

/// Temp files younger than this are never swept (hours).
pub const TEMP_FILE_MAX_AGE_HOURS: u64 = 24;

/// Only processes above this share of memory are kill candidates (percent).
pub const KILL_FLOOR_PCT: f64 = 15.0;

/// Kernel control used to drop page, dentry and inode caches.
pub const DROP_CACHES_PATH: &str = "/proc/sys/vm/drop_caches";

// ============================================================================
// Threshold Evaluator
// ============================================================================

/// CPU above this is CRITICAL (percent).
pub const CPU_CRITICAL_PCT: f64 = 90.0;

/// Memory above this is CRITICAL (percent).
pub const MEMORY_CRITICAL_PCT: f64 = 95.0;

/// Disk above this is CRITICAL (percent).
pub const DISK_CRITICAL_PCT: f64 = 95.0;

/// Network above `threshold * multiplier` is CRITICAL.
pub const NETWORK_CRITICAL_MULTIPLIER: f64 = 2.0;

// ============================================================================
// Control Loop
// ============================================================================

/// Seconds between monitoring cycles.
pub const MONITORING_INTERVAL_SECS: u64 = 10;

/// A `statistics` system event is written every N cycles.
pub const STATISTICS_EVERY_CYCLES: u64 = 10;

// ============================================================================
// Notifications
// ============================================================================

/// Minimum seconds between two notifications with the same dedup key.
pub const NOTIFY_COOLDOWN_SECS: u64 = 300;

/// HTTP client timeout for webhook delivery (seconds).
pub const WEBHOOK_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Dashboard API
// ============================================================================

/// Default number of events returned by the events endpoint.
pub const EVENTS_DEFAULT_LIMIT: usize = 100;

/// Hard cap on events returned by one request.
pub const EVENTS_MAX_LIMIT: usize = 5_000;
