//! Event Log Storage
//!
//! The monitor's only persistent state: a single JSON array of [`Event`]s
//! written by the healing engine and the control loop and tailed by the
//! dashboard API and the CLI.

pub mod event_store;
pub mod events;
pub mod lockfile;
pub mod sanitize;

pub use event_store::{AppendOutcome, EventStore, StoreError};
pub use events::{Event, EventBody, EventCategory, MetricType, SystemEventType};
pub use lockfile::ProcessLock;
pub use sanitize::{default_sanitizer, strip_decorations, Sanitizer};
