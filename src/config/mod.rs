//! Monitor Configuration Module
//!
//! Thresholds, healing policy, storage and notification settings loaded
//! from a TOML file.
//!
//! ## Loading Order
//!
//! 1. `HOSTMEND_CONFIG` environment variable (path to TOML file)
//! 2. `hostmend.toml` in the current working directory
//! 3. Built-in defaults
//!
//! The loaded [`HostmendConfig`] is immutable and handed to each component
//! at construction; there is no global config handle.

mod monitor_config;
pub mod defaults;
pub mod validation;

pub use monitor_config::*;
