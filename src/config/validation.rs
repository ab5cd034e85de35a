//! Config validation: unknown-key detection with Levenshtein suggestions
//! and range checks.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

use super::HostmendConfig;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for `HostmendConfig`.
///
/// Maintained by hand to match the struct hierarchy in monitor_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [monitoring]
        "monitoring",
        "monitoring.interval_secs",
        "monitoring.services",
        "monitoring.statistics_every_cycles",
        "monitoring.disk_path",
        // [thresholds]
        "thresholds",
        "thresholds.cpu_pct",
        "thresholds.memory_pct",
        "thresholds.disk_pct",
        "thresholds.network_mb",
        // [severity]
        "severity",
        "severity.cpu_critical_pct",
        "severity.memory_critical_pct",
        "severity.disk_critical_pct",
        "severity.network_critical_multiplier",
        // [healing]
        "healing",
        "healing.enabled",
        "healing.max_restart_attempts",
        "healing.auto_heal_cpu_pct",
        "healing.auto_heal_memory_pct",
        "healing.auto_heal_disk_pct",
        "healing.kill_floor_pct",
        "healing.cleanup_paths",
        "healing.temp_file_max_age_hours",
        "healing.restart_timeout_secs",
        "healing.status_timeout_secs",
        "healing.settle_delay_ms",
        "healing.use_sudo",
        "healing.protected_users",
        "healing.protected_processes",
        "healing.drop_caches_path",
        // [storage]
        "storage",
        "storage.data_dir",
        "storage.event_log",
        "storage.strip_decorations",
        // [notifications]
        "notifications",
        "notifications.enabled",
        "notifications.cooldown_secs",
        "notifications.min_severity",
        "notifications.recipients",
        "notifications.webhook_url",
        // [server]
        "server",
        "server.enabled",
        "server.addr",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for &k in known {
        let dist = levenshtein(unknown, k);
        if dist > 3 {
            continue;
        }
        // Tie-break on the key itself so the suggestion does not depend on
        // HashSet iteration order.
        let better = match best {
            None => true,
            Some((best_key, best_dist)) => dist < best_dist || (dist == best_dist && k < best_key),
        };
        if better {
            best = Some((k, dist));
        }
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// This does NOT fail on unknown keys, it only warns.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    let found = walk_toml_keys(&value, "");
    let mut warnings = Vec::new();

    for key in &found {
        if !known.contains(key.as_str()) {
            let suggestion = suggest_correction(key, &known);
            let message = format!("Unknown config key '{key}'");
            warnings.push(ValidationWarning {
                field: key.clone(),
                message,
                suggestion,
            });
        }
    }

    warnings
}

// ============================================================================
// Range Validation
// ============================================================================

/// Validate value ranges on a parsed config.
///
/// Returns (errors, warnings). Errors are impossible values that must
/// prevent startup; warnings are suspicious but not fatal.
pub fn validate_ranges(config: &HostmendConfig) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let t = &config.thresholds;
    let s = &config.severity;
    let h = &config.healing;

    let percentages = [
        ("thresholds.cpu_pct", t.cpu_pct),
        ("thresholds.memory_pct", t.memory_pct),
        ("thresholds.disk_pct", t.disk_pct),
        ("severity.cpu_critical_pct", s.cpu_critical_pct),
        ("severity.memory_critical_pct", s.memory_critical_pct),
        ("severity.disk_critical_pct", s.disk_critical_pct),
        ("healing.auto_heal_cpu_pct", h.auto_heal_cpu_pct),
        ("healing.auto_heal_memory_pct", h.auto_heal_memory_pct),
        ("healing.auto_heal_disk_pct", h.auto_heal_disk_pct),
        ("healing.kill_floor_pct", h.kill_floor_pct),
    ];
    for (name, value) in percentages {
        check_percentage(name, value, &mut errors);
    }

    if !t.network_mb.is_finite() || t.network_mb <= 0.0 {
        errors.push(format!(
            "thresholds.network_mb = {} must be a finite value > 0",
            t.network_mb
        ));
    }
    if !s.network_critical_multiplier.is_finite() || s.network_critical_multiplier < 1.0 {
        errors.push(format!(
            "severity.network_critical_multiplier = {} must be a finite value >= 1",
            s.network_critical_multiplier
        ));
    }

    // Healing below alerting is legal but means remediation fires without an alert
    let pairs = [
        ("cpu", t.cpu_pct, h.auto_heal_cpu_pct),
        ("memory", t.memory_pct, h.auto_heal_memory_pct),
        ("disk", t.disk_pct, h.auto_heal_disk_pct),
    ];
    for (name, alert, heal) in pairs {
        if heal < alert {
            warnings.push(ValidationWarning {
                field: format!("healing.auto_heal_{name}_pct"),
                message: format!(
                    "healing.auto_heal_{name}_pct = {heal:.1} is below thresholds.{name}_pct = {alert:.1}; remediation will run without a matching alert"
                ),
                suggestion: None,
            });
        }
    }

    let limits = [
        ("cpu", t.cpu_pct, s.cpu_critical_pct),
        ("memory", t.memory_pct, s.memory_critical_pct),
        ("disk", t.disk_pct, s.disk_critical_pct),
    ];
    for (name, alert, critical) in limits {
        if critical < alert {
            warnings.push(ValidationWarning {
                field: format!("severity.{name}_critical_pct"),
                message: format!(
                    "severity.{name}_critical_pct = {critical:.1} is below thresholds.{name}_pct = {alert:.1}; every {name} alert will be CRITICAL"
                ),
                suggestion: None,
            });
        }
    }

    if config.monitoring.services.is_empty() {
        warnings.push(ValidationWarning {
            field: "monitoring.services".to_string(),
            message: "monitoring.services is empty; no service will be checked or restarted"
                .to_string(),
            suggestion: None,
        });
    }

    for pattern in &h.cleanup_paths {
        if let Err(e) = glob::Pattern::new(pattern) {
            errors.push(format!("healing.cleanup_paths: invalid pattern '{pattern}': {e}"));
        }
    }

    (errors, warnings)
}

fn check_percentage(name: &str, value: f64, errors: &mut Vec<String>) {
    // NaN comparisons silently pass, so check finiteness first
    if !value.is_finite() {
        errors.push(format!("{name} must be a finite number (got {value})"));
    } else if !(0.0..=100.0).contains(&value) {
        errors.push(format!("{name} = {value:.1} is outside 0-100"));
    }
}

// ============================================================================
// Tests
// ============================================================================
