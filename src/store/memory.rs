//! In-memory store.
//!
//! Semantics mirror the SQLite adapter: store-assigned monotonic ids,
//! append-only reports, whole-minute readiness. Useful as the test double
//! and for embedding the engine without a database file.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::monitor::{Monitor, NewMonitor};
use crate::report::{NewReport, Report};
use crate::store::MonitorStore;
use crate::types::{Error, MonitorId, ReportId, Result};

#[derive(Debug, Default)]
struct Inner {
    monitors: Vec<Monitor>,
    reports: Vec<Report>,
    next_monitor_id: i64,
    next_report_id: i64,
}

/// Mutex-guarded store holding plain vectors.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a monitor, assigning its id and creation timestamp.
    pub async fn create_monitor(&self, new: NewMonitor) -> Monitor {
        let mut inner = self.inner.lock().await;
        inner.next_monitor_id += 1;
        let monitor = Monitor {
            id: MonitorId::new(inner.next_monitor_id),
            request_id: new.request_id,
            created_by: new.created_by,
            interpreter: new.interpreter,
            script_path: new.script_path,
            created_at: Utc::now(),
            last_ran_at: None,
            wait_period_minutes: new.wait_period_minutes,
            expected_runtime_secs: new.expected_runtime_secs,
        };
        inner.monitors.push(monitor.clone());
        monitor
    }

    /// Current snapshot of a monitor row.
    pub async fn get_monitor(&self, id: MonitorId) -> Option<Monitor> {
        let inner = self.inner.lock().await;
        inner.monitors.iter().find(|m| m.id == id).cloned()
    }

    /// All reports persisted for a monitor, oldest first.
    pub async fn reports_for(&self, id: MonitorId) -> Vec<Report> {
        let inner = self.inner.lock().await;
        inner
            .reports
            .iter()
            .filter(|r| r.monitor_id == id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MonitorStore for MemoryStore {
    async fn list_ready(&self, limit: u32) -> Result<Vec<Monitor>> {
        let now = Utc::now();
        let inner = self.inner.lock().await;
        Ok(inner
            .monitors
            .iter()
            .filter(|m| m.is_ready(now))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn touch_last_run(&self, monitor: &Monitor) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let row = inner
            .monitors
            .iter_mut()
            .find(|m| m.id == monitor.id)
            .ok_or_else(|| Error::storage(format!("unknown monitor {}", monitor.id)))?;
        row.last_ran_at = Some(Utc::now());
        Ok(())
    }

    async fn latest_report(&self, monitor: &Monitor) -> Result<Option<Report>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .reports
            .iter()
            .filter(|r| r.monitor_id == monitor.id)
            .max_by_key(|r| (r.created_at, r.id))
            .cloned())
    }

    async fn save_report(&self, report: NewReport) -> Result<Report> {
        let mut inner = self.inner.lock().await;
        inner.next_report_id += 1;
        let row = Report {
            id: ReportId::new(inner.next_report_id),
            monitor_id: report.monitor_id,
            created_at: Utc::now(),
            significance: report.significance,
            message: report.message,
            checksum: report.checksum,
            state: report.state,
        };
        inner.reports.push(row.clone());
        Ok(row)
    }
}
