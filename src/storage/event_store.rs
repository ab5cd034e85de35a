//! Event Store - durable append-only event log kept as one JSON array
//!
//! Every append is a full read-modify-rewrite of the file: take the
//! exclusive lock, read the current array, push the new event, write the
//! result to a sibling temp file, fsync, and rename it over the log. A
//! reader in another process therefore sees either the old or the new
//! array, never a torn file. Append cost grows with the log; rotation is
//! out of scope.
//!
//! Elements are carried through a rewrite as raw JSON objects, so entries
//! this build cannot decode (older labels, other writers) are preserved.
//! Reads skip them with a warning. Only content that is not a JSON array
//! of objects counts as corrupt.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::events::{Event, EventCategory};
use super::sanitize::Sanitizer;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("event log I/O error ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("event serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result of a completed append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum AppendOutcome {
    /// Event added to the existing log
    Appended { total: usize },
    /// The previous content was unreadable and has been replaced by a
    /// log holding only the new event
    CorruptionRecovered { discarded_bytes: usize },
}

impl AppendOutcome {
    pub const fn recovered_from_corruption(self) -> bool {
        matches!(self, Self::CorruptionRecovered { .. })
    }
}

/// One log element as stored.
type Record = Map<String, Value>;

/// What was found on disk.
enum Contents {
    Records(Vec<Record>),
    Corrupt { bytes: usize, error: serde_json::Error },
}

/// Thread-safe handle to the JSON array event log.
///
/// One `EventStore` per file per process: the lock lives in the handle, so
/// share it behind an `Arc` rather than opening the same path twice.
pub struct EventStore {
    path: PathBuf,
    lock: RwLock<()>,
    sanitizer: Option<Sanitizer>,
}

impl std::fmt::Debug for EventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStore")
            .field("path", &self.path)
            .field("sanitized", &self.sanitizer.is_some())
            .finish()
    }
}

impl EventStore {
    /// Open (or create) the event log at `path`.
    ///
    /// A missing or empty file is initialised to `[]`. Existing content is
    /// left untouched, even if unreadable; the next append recovers it.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }

        let store = Self {
            path,
            lock: RwLock::new(()),
            sanitizer: None,
        };

        let needs_init = match fs::metadata(&store.path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => return Err(io_error(&store.path, e)),
        };
        if needs_init {
            store.write_atomic(&[])?;
            debug!(path = %store.path.display(), "Event log initialised");
        }

        Ok(store)
    }

    /// Apply `sanitizer` to every event message before it is stored.
    #[must_use]
    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = Some(sanitizer);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event.
    ///
    /// Blocks for the whole read-rewrite cycle. Concurrent callers are
    /// serialized; none of their events is lost.
    pub fn append(&self, mut event: Event) -> Result<AppendOutcome, StoreError> {
        // Sanitize before taking the lock
        if let (Some(sanitize), Some(message)) = (&self.sanitizer, event.message_mut()) {
            *message = sanitize(message);
        }
        let record: Record = serde_json::from_value(serde_json::to_value(&event)?)?;

        let _guard = self.lock.write().unwrap_or_else(|e| {
            warn!("Event log lock poisoned on write, recovering");
            PoisonError::into_inner(e)
        });

        match self.read_contents()? {
            Contents::Records(mut records) => {
                records.push(record);
                self.write_atomic(&records)?;
                Ok(AppendOutcome::Appended {
                    total: records.len(),
                })
            }
            Contents::Corrupt { bytes, error } => {
                warn!(
                    path = %self.path.display(),
                    discarded_bytes = bytes,
                    error = %error,
                    "Event log unreadable, reinitialising with the new event"
                );
                self.write_atomic(std::slice::from_ref(&record))?;
                Ok(AppendOutcome::CorruptionRecovered {
                    discarded_bytes: bytes,
                })
            }
        }
    }

    /// Read the whole log, oldest first.
    ///
    /// Unreadable content yields an empty log (and a warning), never an error.
    /// Elements that do not decode as an [`Event`] are skipped.
    pub fn read_all(&self) -> Result<Vec<Event>, StoreError> {
        let _guard = self.lock.read().unwrap_or_else(|e| {
            warn!("Event log lock poisoned on read, recovering");
            PoisonError::into_inner(e)
        });

        match self.read_contents()? {
            Contents::Records(records) => Ok(self.decode(records)),
            Contents::Corrupt { bytes, error } => {
                warn!(
                    path = %self.path.display(),
                    bytes = bytes,
                    error = %error,
                    "Event log unreadable, returning no events"
                );
                Ok(Vec::new())
            }
        }
    }

    /// The `limit` most recent events, optionally of one category, oldest first.
    pub fn read_kind(
        &self,
        category: Option<EventCategory>,
        limit: usize,
    ) -> Result<Vec<Event>, StoreError> {
        let mut events: Vec<Event> = self
            .read_all()?
            .into_iter()
            .filter(|e| category.map_or(true, |c| e.category() == c))
            .collect();
        let skip = events.len().saturating_sub(limit);
        events.drain(..skip);
        Ok(events)
    }

    /// Remove every event. The only operation that deletes history.
    pub fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.write().unwrap_or_else(|e| {
            warn!("Event log lock poisoned on clear, recovering");
            PoisonError::into_inner(e)
        });
        self.write_atomic(&[])?;
        warn!(path = %self.path.display(), "Event log cleared");
        Ok(())
    }

    fn decode(&self, records: Vec<Record>) -> Vec<Event> {
        let total = records.len();
        let mut skipped = 0usize;
        let events: Vec<Event> = records
            .into_iter()
            .filter_map(|record| match serde_json::from_value(Value::Object(record)) {
                Ok(event) => Some(event),
                Err(e) => {
                    debug!(error = %e, "Skipping undecodable event log entry");
                    skipped += 1;
                    None
                }
            })
            .collect();
        if skipped > 0 {
            warn!(
                path = %self.path.display(),
                skipped,
                total,
                "Event log holds entries this build cannot decode, skipping them"
            );
        }
        events
    }

    /// Caller must hold the lock (read or write).
    fn read_contents(&self) -> Result<Contents, StoreError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Contents::Records(Vec::new())),
            Err(e) => return Err(io_error(&self.path, e)),
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Contents::Records(Vec::new()));
        }

        Ok(match serde_json::from_slice::<Vec<Record>>(&data) {
            Ok(records) => Contents::Records(records),
            Err(error) => Contents::Corrupt {
                bytes: data.len(),
                error,
            },
        })
    }

    /// Write to a temp file beside the log, fsync, then rename over it.
    /// The temp file is removed if any step fails.
    /// Caller must hold the write lock.
    fn write_atomic(&self, records: &[Record]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(records)?;
        let tmp_path = self.tmp_path();

        let written = File::create(&tmp_path)
            .and_then(|mut file| {
                file.write_all(&json)?;
                file.sync_all()
            })
            .map_err(|e| io_error(&tmp_path, e))
            .and_then(|()| fs::rename(&tmp_path, &self.path).map_err(|e| io_error(&self.path, e)));

        if written.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        written
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name: OsString = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::events::{EventBody, SystemEventType};
    use crate::storage::sanitize::default_sanitizer;
    use crate::types::{ActionType, AlertType, HealingAction};
    use chrono::Utc;
    use serde_json::json;

    fn system_event(message: &str) -> Event {
        Event::system(SystemEventType::MonitoringCycle, message, Map::new())
    }

    fn open_temp() -> (tempfile::TempDir, EventStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path().join("logs").join("monitoring.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_open_initialises_empty_array() {
        let (_dir, store) = open_temp();
        let raw = fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw.trim(), "[]");
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_append_then_read_preserves_nested_details() {
        let (_dir, store) = open_temp();
        let details = json!({
            "status": "success",
            "freed_mb": 12.5,
            "cleaned_paths": [{"path": "/tmp", "freed_bytes": 13107200, "files_removed": 4}],
        });
        let action = HealingAction {
            action_type: ActionType::CleanupTempFiles,
            trigger: AlertType::LowDisk,
            target: None,
            success: true,
            message: "12.5 MB freed".into(),
            details: details.as_object().cloned().unwrap(),
            timestamp: Utc::now(),
        };
        let event = Event::action(&action);

        let outcome = store.append(event.clone()).unwrap();
        assert_eq!(outcome, AppendOutcome::Appended { total: 1 });

        let events = store.read_all().unwrap();
        assert_eq!(events, vec![event]);
    }

    #[test]
    fn test_appends_keep_write_order() {
        let (_dir, store) = open_temp();
        for i in 0..5 {
            let _ = store.append(system_event(&format!("cycle {i}"))).unwrap();
        }
        let messages: Vec<String> = store
            .read_all()
            .unwrap()
            .iter()
            .filter_map(|e| e.message().map(str::to_string))
            .collect();
        assert_eq!(messages, vec!["cycle 0", "cycle 1", "cycle 2", "cycle 3", "cycle 4"]);
    }

    #[test]
    fn test_corrupt_log_recovered_on_append() {
        let (_dir, store) = open_temp();
        let _ = store.append(system_event("before")).unwrap();
        fs::write(store.path(), b"[{\"timestamp\": \"2024-01-01T00:00:00Z\", \"event_type\":").unwrap();

        assert!(store.read_all().unwrap().is_empty());

        let event = system_event("after");
        let outcome = store.append(event.clone()).unwrap();
        assert!(outcome.recovered_from_corruption());
        assert_eq!(store.read_all().unwrap(), vec![event]);
    }

    #[test]
    fn test_non_array_json_counts_as_corrupt() {
        let (_dir, store) = open_temp();
        fs::write(store.path(), b"{\"events\": []}").unwrap();
        let outcome = store.append(system_event("x")).unwrap();
        assert_eq!(
            outcome,
            AppendOutcome::CorruptionRecovered {
                discarded_bytes: 14
            }
        );
    }

    #[test]
    fn test_array_of_non_objects_counts_as_corrupt() {
        let (_dir, store) = open_temp();
        fs::write(store.path(), b"[1, 2]").unwrap();
        assert!(store.read_all().unwrap().is_empty());
        let outcome = store.append(system_event("x")).unwrap();
        assert_eq!(
            outcome,
            AppendOutcome::CorruptionRecovered { discarded_bytes: 6 }
        );
    }

    #[test]
    fn test_foreign_entries_survive_append() {
        let (_dir, store) = open_temp();
        let foreign = json!([
            {
                "timestamp": "2024-05-01T10:00:00.123456",
                "event_type": "action",
                "action_type": "restart_service",
                "status": "SUCCESS",
                "service": "nginx",
                "message": "Service nginx restarted successfully",
                "details": {"attempt": 1}
            },
            {
                "timestamp": "2024-05-01T10:00:05",
                "event_type": "system",
                "system_event_type": "start",
                "message": "Monitoring started",
                "details": {}
            }
        ]);
        fs::write(store.path(), serde_json::to_vec(&foreign).unwrap()).unwrap();

        // The naive-timestamp entry decodes, the unknown action label does not
        let events = store.read_all().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message(), Some("Monitoring started"));

        let outcome = store.append(system_event("after")).unwrap();
        assert_eq!(outcome, AppendOutcome::Appended { total: 3 });

        let on_disk: Vec<Value> =
            serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk.len(), 3);
        assert_eq!(on_disk[0], foreign[0]);
        assert_eq!(on_disk[1], foreign[1]);

        let messages: Vec<_> = store
            .read_all()
            .unwrap()
            .iter()
            .filter_map(|e| e.message().map(str::to_string))
            .collect();
        assert_eq!(messages, vec!["Monitoring started", "after"]);
    }

    #[test]
    fn test_failed_write_removes_temp_file() {
        let (dir, store) = open_temp();
        let _ = store.append(system_event("one")).unwrap();

        // A non-empty directory at the log path makes the final rename fail
        fs::remove_file(store.path()).unwrap();
        fs::create_dir(store.path()).unwrap();
        fs::write(store.path().join("occupied"), b"x").unwrap();

        assert!(matches!(store.clear(), Err(StoreError::Io { .. })));
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("logs"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty(), "temp file left behind: {leftovers:?}");
    }

    #[test]
    fn test_empty_and_missing_file_read_as_empty() {
        let (_dir, store) = open_temp();
        fs::write(store.path(), b"  \n").unwrap();
        assert!(store.read_all().unwrap().is_empty());
        let outcome = store.append(system_event("first")).unwrap();
        assert_eq!(outcome, AppendOutcome::Appended { total: 1 });

        fs::remove_file(store.path()).unwrap();
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_clear_empties_log() {
        let (_dir, store) = open_temp();
        let _ = store.append(system_event("one")).unwrap();
        let _ = store.append(system_event("two")).unwrap();
        store.clear().unwrap();
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let (dir, store) = open_temp();
        let _ = store.append(system_event("one")).unwrap();
        let leftovers: Vec<_> = fs::read_dir(dir.path().join("logs"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_sanitizer_applied_to_messages() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::open(dir.path().join("monitoring.json"))
            .unwrap()
            .with_sanitizer(default_sanitizer());
        let _ = store.append(system_event("🔄 Monitoring cycle #3")).unwrap();

        let events = store.read_all().unwrap();
        match &events[0].body {
            EventBody::System { message, .. } => assert_eq!(message, "Monitoring cycle #3"),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_read_kind_filters_and_limits() {
        let (_dir, store) = open_temp();
        for i in 0..4 {
            let _ = store.append(system_event(&format!("s{i}"))).unwrap();
            let _ = store.append(Event::service_status("cron", i % 2 == 0)).unwrap();
        }

        let systems = store.read_kind(Some(EventCategory::System), 2).unwrap();
        let messages: Vec<_> = systems.iter().filter_map(Event::message).collect();
        assert_eq!(messages, vec!["s2", "s3"]);

        let all = store.read_kind(None, 100).unwrap();
        assert_eq!(all.len(), 8);
    }
}
