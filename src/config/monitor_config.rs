//! Monitor Configuration - thresholds, healing policy and storage as TOML values
//!
//! Each struct implements `Default` with the stock values, so a missing
//! config file (or a missing section) yields the standard behaviour.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;
use crate::types::Severity;

/// Environment variable pointing at a config file.
pub const CONFIG_ENV_VAR: &str = "HOSTMEND_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "hostmend.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration, immutable for the lifetime of the process.
///
/// Load with `HostmendConfig::load()` which searches:
/// 1. `$HOSTMEND_CONFIG` env var
/// 2. `./hostmend.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostmendConfig {
    /// Sampling cadence and monitored services
    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// Alert thresholds
    #[serde(default)]
    pub thresholds: AlertThresholds,

    /// Severity escalation limits
    #[serde(default)]
    pub severity: SeverityLimits,

    /// Auto-healing policy
    #[serde(default)]
    pub healing: HealingConfig,

    /// Event log location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Alert notifications
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Read-only dashboard API
    #[serde(default)]
    pub server: ServerConfig,
}

impl HostmendConfig {
    /// Load configuration using the standard search order:
    /// 1. `$HOSTMEND_CONFIG` environment variable
    /// 2. `./hostmend.toml` in the current working directory
    /// 3. Built-in defaults
    ///
    /// A file that exists but fails validation is an error; it is never
    /// silently replaced by defaults.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                let config = Self::load_from_file(&p)?;
                info!(path = %p.display(), "Loaded config from {}", CONFIG_ENV_VAR);
                return Ok(config);
            }
            warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            let config = Self::load_from_file(&local)?;
            info!("Loaded config from ./{}", LOCAL_CONFIG_FILE);
            return Ok(config);
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Ok(Self::default())
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, err) => ConfigError::Parse(path.to_path_buf(), err),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys are logged as warnings with a suggested correction and
    /// never fail the load.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate all values for internal consistency.
    ///
    /// Rules:
    /// - Percentages must be finite and within 0-100
    /// - Intervals, timeouts and attempt limits must be > 0
    /// - Severity limits must sit at or above the alert thresholds (warning only)
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let m = &self.monitoring;
        if m.interval_secs == 0 {
            errors.push("monitoring.interval_secs must be > 0".to_string());
        }
        if m.statistics_every_cycles == 0 {
            errors.push("monitoring.statistics_every_cycles must be > 0".to_string());
        }

        let h = &self.healing;
        if h.max_restart_attempts == 0 {
            errors.push("healing.max_restart_attempts must be > 0".to_string());
        }
        if h.restart_timeout_secs == 0 {
            errors.push("healing.restart_timeout_secs must be > 0".to_string());
        }
        if h.status_timeout_secs == 0 {
            errors.push("healing.status_timeout_secs must be > 0".to_string());
        }

        let s = &self.storage;
        if s.event_log.trim().is_empty() {
            errors.push("storage.event_log must not be empty".to_string());
        }

        let (range_errors, range_warnings) = super::validation::validate_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Full path of the event log file.
    pub fn event_log_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.event_log)
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            Self::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            Self::Serialize(e) => write!(f, "Config serialization error: {}", e),
            Self::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Monitoring
// ============================================================================

/// Sampling cadence and the services to watch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Seconds between cycles.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// systemd units checked every cycle.
    #[serde(default = "default_services")]
    pub services: Vec<String>,

    /// A statistics event is written every N cycles.
    #[serde(default = "default_statistics_every")]
    pub statistics_every_cycles: u64,

    /// Mount point whose usage is reported as `disk_pct`.
    #[serde(default = "default_disk_path")]
    pub disk_path: String,
}

fn default_interval_secs() -> u64 { defaults::MONITORING_INTERVAL_SECS }
fn default_services() -> Vec<String> {
    ["ssh", "cron", "dbus", "network-manager"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}
fn default_statistics_every() -> u64 { defaults::STATISTICS_EVERY_CYCLES }
fn default_disk_path() -> String { "/".to_string() }

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            services: default_services(),
            statistics_every_cycles: default_statistics_every(),
            disk_path: default_disk_path(),
        }
    }
}

impl MonitoringConfig {
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ============================================================================
// Alert Thresholds
// ============================================================================

/// Primary thresholds: crossing one raises an alert, nothing more.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertThresholds {
    #[serde(default = "default_cpu_pct")]
    pub cpu_pct: f64,

    #[serde(default = "default_memory_pct")]
    pub memory_pct: f64,

    #[serde(default = "default_disk_pct")]
    pub disk_pct: f64,

    /// Combined sent + received MB per interval.
    #[serde(default = "default_network_mb")]
    pub network_mb: f64,
}

fn default_cpu_pct() -> f64 { 80.0 }
fn default_memory_pct() -> f64 { 85.0 }
fn default_disk_pct() -> f64 { 90.0 }
fn default_network_mb() -> f64 { 100.0 }

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            cpu_pct: default_cpu_pct(),
            memory_pct: default_memory_pct(),
            disk_pct: default_disk_pct(),
            network_mb: default_network_mb(),
        }
    }
}

/// Values above these limits escalate an alert to CRITICAL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityLimits {
    #[serde(default = "default_cpu_critical")]
    pub cpu_critical_pct: f64,

    #[serde(default = "default_memory_critical")]
    pub memory_critical_pct: f64,

    #[serde(default = "default_disk_critical")]
    pub disk_critical_pct: f64,

    /// Network is CRITICAL above `network_mb * multiplier`.
    #[serde(default = "default_network_multiplier")]
    pub network_critical_multiplier: f64,
}

fn default_cpu_critical() -> f64 { defaults::CPU_CRITICAL_PCT }
fn default_memory_critical() -> f64 { defaults::MEMORY_CRITICAL_PCT }
fn default_disk_critical() -> f64 { defaults::DISK_CRITICAL_PCT }
fn default_network_multiplier() -> f64 { defaults::NETWORK_CRITICAL_MULTIPLIER }

impl Default for SeverityLimits {
    fn default() -> Self {
        Self {
            cpu_critical_pct: default_cpu_critical(),
            memory_critical_pct: default_memory_critical(),
            disk_critical_pct: default_disk_critical(),
            network_critical_multiplier: default_network_multiplier(),
        }
    }
}

// ============================================================================
// Healing Policy
// ============================================================================

/// Auto-healing thresholds and remediation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealingConfig {
    /// Master switch for all remediation.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Consecutive failed restarts before a service is left alone.
    #[serde(default = "default_max_attempts")]
    pub max_restart_attempts: u32,

    /// CPU above this triggers a cache clear.
    #[serde(default = "default_heal_cpu")]
    pub auto_heal_cpu_pct: f64,

    /// Memory above this kills the top memory consumer.
    #[serde(default = "default_heal_memory")]
    pub auto_heal_memory_pct: f64,

    /// Disk above this sweeps temp files.
    #[serde(default = "default_heal_disk")]
    pub auto_heal_disk_pct: f64,

    /// Only processes using more than this share of memory may be killed.
    #[serde(default = "default_kill_floor")]
    pub kill_floor_pct: f64,

    /// Glob patterns of directories swept when disk is low.
    #[serde(default = "default_cleanup_paths")]
    pub cleanup_paths: Vec<String>,

    /// Files younger than this are never swept.
    #[serde(default = "default_max_age_hours")]
    pub temp_file_max_age_hours: u64,

    #[serde(default = "default_restart_timeout")]
    pub restart_timeout_secs: u64,

    #[serde(default = "default_status_timeout")]
    pub status_timeout_secs: u64,

    /// Wait between a restart and its liveness re-check.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Prefix restarts with `sudo`.
    #[serde(default = "default_true")]
    pub use_sudo: bool,

    /// Owners whose processes are never killed.
    #[serde(default = "default_protected_users")]
    pub protected_users: Vec<String>,

    /// Process names that are never killed.
    #[serde(default = "default_protected_processes")]
    pub protected_processes: Vec<String>,

    /// Kernel cache control written by the cache clear.
    #[serde(default = "default_drop_caches_path")]
    pub drop_caches_path: PathBuf,
}

fn default_true() -> bool { true }
fn default_max_attempts() -> u32 { 3 }
fn default_heal_cpu() -> f64 { 90.0 }
fn default_heal_memory() -> f64 { 95.0 }
fn default_heal_disk() -> f64 { 95.0 }
fn default_kill_floor() -> f64 { defaults::KILL_FLOOR_PCT }
fn default_cleanup_paths() -> Vec<String> {
    ["/tmp", "/var/tmp", "/home/*/tmp"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}
fn default_max_age_hours() -> u64 { defaults::TEMP_FILE_MAX_AGE_HOURS }
fn default_restart_timeout() -> u64 { defaults::RESTART_TIMEOUT_SECS }
fn default_status_timeout() -> u64 { defaults::STATUS_TIMEOUT_SECS }
fn default_settle_delay() -> u64 { defaults::SETTLE_DELAY_MS }
fn default_protected_users() -> Vec<String> {
    vec!["root".to_string(), "system".to_string()]
}
fn default_protected_processes() -> Vec<String> {
    ["systemd", "kernel", "init", "kthreadd", "sshd", "dbus-daemon"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}
fn default_drop_caches_path() -> PathBuf { PathBuf::from(defaults::DROP_CACHES_PATH) }

impl Default for HealingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_restart_attempts: default_max_attempts(),
            auto_heal_cpu_pct: default_heal_cpu(),
            auto_heal_memory_pct: default_heal_memory(),
            auto_heal_disk_pct: default_heal_disk(),
            kill_floor_pct: default_kill_floor(),
            cleanup_paths: default_cleanup_paths(),
            temp_file_max_age_hours: default_max_age_hours(),
            restart_timeout_secs: default_restart_timeout(),
            status_timeout_secs: default_status_timeout(),
            settle_delay_ms: default_settle_delay(),
            use_sudo: true,
            protected_users: default_protected_users(),
            protected_processes: default_protected_processes(),
            drop_caches_path: default_drop_caches_path(),
        }
    }
}

impl HealingConfig {
    pub const fn restart_timeout(&self) -> Duration {
        Duration::from_secs(self.restart_timeout_secs)
    }

    pub const fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status_timeout_secs)
    }

    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub const fn temp_file_max_age(&self) -> Duration {
        Duration::from_secs(self.temp_file_max_age_hours * 3_600)
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Where the event log lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// File name of the JSON array event log inside `data_dir`.
    #[serde(default = "default_event_log")]
    pub event_log: String,

    /// Remove emoji and decorative glyphs from event messages.
    #[serde(default = "default_true")]
    pub strip_decorations: bool,
}

fn default_data_dir() -> PathBuf { PathBuf::from("./data") }
fn default_event_log() -> String { "monitoring.json".to_string() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            event_log: default_event_log(),
            strip_decorations: true,
        }
    }
}

// ============================================================================
// Notifications
// ============================================================================

/// Alert delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Minimum seconds between notifications sharing a dedup key.
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,

    /// Alerts below this severity are not sent.
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,

    #[serde(default)]
    pub recipients: Vec<String>,

    /// JSON webhook endpoint; omitted means log-only delivery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

fn default_cooldown() -> u64 { defaults::NOTIFY_COOLDOWN_SECS }
fn default_min_severity() -> Severity { Severity::Critical }

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cooldown_secs: default_cooldown(),
            min_severity: default_min_severity(),
            recipients: Vec::new(),
            webhook_url: None,
        }
    }
}

// ============================================================================
// Server
// ============================================================================

/// Read-only dashboard API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_addr")]
    pub addr: String,
}

fn default_addr() -> String { "127.0.0.1:8050".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: default_addr(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_stock_values() {
        let config = HostmendConfig::default();
        assert_eq!(config.monitoring.interval_secs, 10);
        assert_eq!(config.thresholds.cpu_pct, 80.0);
        assert_eq!(config.thresholds.memory_pct, 85.0);
        assert_eq!(config.thresholds.disk_pct, 90.0);
        assert_eq!(config.thresholds.network_mb, 100.0);
        assert_eq!(config.healing.max_restart_attempts, 3);
        assert_eq!(config.healing.kill_floor_pct, 15.0);
        assert_eq!(config.notifications.min_severity, Severity::Critical);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = HostmendConfig::from_toml_str(
            r#"
[thresholds]
cpu_pct = 70.0

[healing]
max_restart_attempts = 5
"#,
        )
        .unwrap();
        assert_eq!(config.thresholds.cpu_pct, 70.0);
        assert_eq!(config.thresholds.disk_pct, 90.0);
        assert_eq!(config.healing.max_restart_attempts, 5);
        assert_eq!(config.healing.auto_heal_cpu_pct, 90.0);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let result = HostmendConfig::from_toml_str("[healing]\nmax_restart_attempts = 0\n");
        match result {
            Err(ConfigError::Validation(errors)) => {
                assert!(errors.iter().any(|e| e.contains("max_restart_attempts")));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result = HostmendConfig::from_toml_str("[thresholds\ncpu_pct = ");
        assert!(matches!(result, Err(ConfigError::Parse(_, _))));
    }

    #[test]
    fn test_load_from_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hostmend.toml");
        let mut config = HostmendConfig::default();
        config.monitoring.services = vec!["nginx".to_string()];
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        let loaded = HostmendConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.monitoring.services, vec!["nginx".to_string()]);
    }

    #[test]
    fn test_event_log_path_joins_data_dir() {
        let config = HostmendConfig::default();
        assert_eq!(
            config.event_log_path(),
            PathBuf::from("./data").join("monitoring.json")
        );
    }
}
