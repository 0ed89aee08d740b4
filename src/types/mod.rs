//! Core types for the monitor execution engine.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Strongly-typed identifiers (MonitorId, ReportId, etc.)
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for the store and watcher loop

mod config;
mod errors;
mod ids;

pub use config::{Config, DatabaseConfig, ObservabilityConfig, WatcherConfig};
pub use errors::{Error, Result};
pub use ids::{MonitorId, ReportId, RequestId, UserId};
