//! Temp-file sweep
//!
//! Expands glob patterns to directories and deletes regular files older than
//! a cutoff. Symlinks are never followed. Files that cannot be inspected or
//! removed are skipped.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// What one directory gave back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathSweep {
    pub path: PathBuf,
    pub freed_bytes: u64,
    pub files_removed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Directories where at least one file was removed
    pub cleaned: Vec<PathSweep>,
    pub directories_scanned: usize,
}

impl SweepReport {
    pub fn freed_bytes(&self) -> u64 {
        self.cleaned.iter().map(|p| p.freed_bytes).sum()
    }

    pub fn files_removed(&self) -> u64 {
        self.cleaned.iter().map(|p| p.files_removed).sum()
    }
}

/// Directories matched by `patterns`, deduplicated, in match order.
pub fn expand_patterns(patterns: &[String]) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for pattern in patterns {
        let paths = match glob::glob(pattern) {
            Ok(paths) => paths,
            Err(e) => {
                warn!(pattern = %pattern, "Invalid cleanup pattern: {}", e);
                continue;
            }
        };
        for path in paths.filter_map(Result::ok) {
            if path.is_dir() && !dirs.contains(&path) {
                dirs.push(path);
            }
        }
    }
    dirs
}

/// Delete files under `patterns` last modified more than `max_age` before `now`.
pub fn sweep(patterns: &[String], max_age: Duration, now: SystemTime) -> SweepReport {
    let mut report = SweepReport::default();

    for dir in expand_patterns(patterns) {
        report.directories_scanned += 1;
        let before = dir_size(&dir);
        let files_removed = remove_stale_files(&dir, max_age, now);
        let after = dir_size(&dir);

        if files_removed > 0 {
            let freed_bytes = before.saturating_sub(after);
            debug!(path = %dir.display(), files_removed, freed_bytes, "Swept directory");
            report.cleaned.push(PathSweep {
                path: dir,
                freed_bytes,
                files_removed,
            });
        }
    }

    report
}

fn remove_stale_files(dir: &Path, max_age: Duration, now: SystemTime) -> u64 {
    let mut removed = 0;
    for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let modified = match entry.metadata().ok().and_then(|m| m.modified().ok()) {
            Some(t) => t,
            None => continue,
        };
        // Future mtimes count as fresh
        let stale = now
            .duration_since(modified)
            .map(|age| age > max_age)
            .unwrap_or(false);
        if !stale {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => debug!(path = %entry.path().display(), "Skipping file: {}", e),
        }
    }
    removed
}

/// Total size of regular files under `dir`; unreadable entries count as 0.
fn dir_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}
