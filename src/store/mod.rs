//! Data-access surface the engine depends on.
//!
//! The watcher consumes exactly the four operations on [`MonitorStore`];
//! everything else about the backing store (schema, pooling, user CRUD) is
//! someone else's concern. Two implementations ship here: a SQLite adapter
//! for production and an in-memory fake for tests and embedders.

use async_trait::async_trait;

use crate::monitor::Monitor;
use crate::report::{NewReport, Report};
use crate::types::Result;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Narrow repository contract the engine runs against.
///
/// Implementations must be safe to share across tasks; the engine only ever
/// holds the store behind an `Arc`.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// Up to `limit` monitors whose wait period has elapsed. Ordering within
    /// the result is unspecified but stable for a single call.
    async fn list_ready(&self, limit: u32) -> Result<Vec<Monitor>>;

    /// Record that a monitor has been dispatched, resetting its wait period.
    /// Called before the subprocess spawns so a long-running script is not
    /// re-selected on the next tick.
    async fn touch_last_run(&self, monitor: &Monitor) -> Result<()>;

    /// Most recent persisted report for a monitor, if any.
    async fn latest_report(&self, monitor: &Monitor) -> Result<Option<Report>>;

    /// Append a new report. Reports are never updated or deleted.
    async fn save_report(&self, report: NewReport) -> Result<Report>;
}
