//! SQLite store adapter.
//!
//! Row mapping goes through `sqlx::query` + `try_get` so the crate builds
//! without a live database. Timestamps are chrono `DateTime<Utc>` values
//! stored as text; the opaque report state is serialized JSON text re-parsed
//! on load.

use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::monitor::{Interpreter, Monitor, NewMonitor};
use crate::report::{NewReport, Report, Significance, StateMap};
use crate::store::MonitorStore;
use crate::types::{DatabaseConfig, Error, MonitorId, ReportId, RequestId, Result, UserId};

const INIT_MONITORS_TABLE: &str = "
create table if not exists monitors (
  id integer primary key,
  request_id integer not null,
  created_by integer not null,
  interpreter varchar(16) not null,
  script_location varchar(255) not null,
  created_at timestamp not null,
  last_ran_at timestamp,
  wait_period_minutes integer not null,
  expected_run_time integer not null
);";

const INIT_REPORTS_TABLE: &str = "
create table if not exists reports (
  id integer primary key,
  monitor_id integer not null,
  created_at timestamp not null,
  change_significance integer not null,
  message text not null,
  checksum varchar(64) not null,
  state text not null,
  foreign key(monitor_id) references monitors(id)
);";

/// Pooled SQLite store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (and create if missing) the database behind `config.url`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// Private in-memory database, one connection so it lives as long as the
    /// pool. Used by tests and embedders.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the engine's tables.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(INIT_MONITORS_TABLE).execute(&self.pool).await?;
        sqlx::query(INIT_REPORTS_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    /// Insert a monitor row; the store assigns id and creation timestamp.
    pub async fn create_monitor(&self, new: NewMonitor) -> Result<Monitor> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "insert into monitors
               (request_id, created_by, interpreter, script_location, created_at,
                wait_period_minutes, expected_run_time)
             values (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(new.request_id.as_i64())
        .bind(new.created_by.as_i64())
        .bind(new.interpreter.as_str())
        .bind(new.script_path.to_string_lossy().into_owned())
        .bind(created_at)
        .bind(i64::from(new.wait_period_minutes))
        .bind(i64::from(new.expected_runtime_secs))
        .execute(&self.pool)
        .await?;

        Ok(Monitor {
            id: MonitorId::new(result.last_insert_rowid()),
            request_id: new.request_id,
            created_by: new.created_by,
            interpreter: new.interpreter,
            script_path: new.script_path,
            created_at,
            last_ran_at: None,
            wait_period_minutes: new.wait_period_minutes,
            expected_runtime_secs: new.expected_runtime_secs,
        })
    }

    fn map_monitor_row(row: &SqliteRow) -> Result<Monitor> {
        let script_location: String = row.try_get("script_location")?;
        let interpreter: String = row.try_get("interpreter")?;
        let wait_period: i64 = row.try_get("wait_period_minutes")?;
        let expected_runtime: i64 = row.try_get("expected_run_time")?;

        Ok(Monitor {
            id: MonitorId::new(row.try_get("id")?),
            request_id: RequestId::new(row.try_get("request_id")?),
            created_by: UserId::new(row.try_get("created_by")?),
            interpreter: Interpreter::new(interpreter),
            script_path: PathBuf::from(script_location),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            last_ran_at: row.try_get::<Option<DateTime<Utc>>, _>("last_ran_at")?,
            wait_period_minutes: u32::try_from(wait_period.max(0))
                .map_err(|e| Error::storage(format!("wait_period_minutes out of range: {e}")))?,
            expected_runtime_secs: u32::try_from(expected_runtime.max(0))
                .map_err(|e| Error::storage(format!("expected_run_time out of range: {e}")))?,
        })
    }

    fn map_report_row(row: &SqliteRow) -> Result<Report> {
        let state_text: String = row.try_get("state")?;
        let state: StateMap = serde_json::from_str(&state_text)
            .map_err(|e| Error::storage(format!("corrupt report state column: {e}")))?;

        Ok(Report {
            id: ReportId::new(row.try_get("id")?),
            monitor_id: MonitorId::new(row.try_get("monitor_id")?),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            significance: Significance::from_level(row.try_get("change_significance")?),
            message: row.try_get("message")?,
            checksum: row.try_get("checksum")?,
            state,
        })
    }
}

#[async_trait]
impl MonitorStore for SqliteStore {
    async fn list_ready(&self, limit: u32) -> Result<Vec<Monitor>> {
        // Whole-minute floor: elapsed fractional days scale to minutes and
        // truncate before comparing against the wait period.
        let rows = sqlx::query(
            "select id, request_id, created_by, interpreter, script_location,
                    created_at, last_ran_at, wait_period_minutes, expected_run_time
             from monitors
             where last_ran_at is null
                or cast((julianday('now') - julianday(last_ran_at)) * 1440 as integer)
                   >= wait_period_minutes
             order by id asc
             limit ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_monitor_row).collect()
    }

    async fn touch_last_run(&self, monitor: &Monitor) -> Result<()> {
        let result = sqlx::query("update monitors set last_ran_at = ? where id = ?")
            .bind(Utc::now())
            .bind(monitor.id.as_i64())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::storage(format!("unknown monitor {}", monitor.id)));
        }
        Ok(())
    }

    async fn latest_report(&self, monitor: &Monitor) -> Result<Option<Report>> {
        let row = sqlx::query(
            "select id, monitor_id, created_at, change_significance, message, checksum, state
             from reports
             where monitor_id = ?
             order by created_at desc, id desc
             limit 1",
        )
        .bind(monitor.id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::map_report_row).transpose()
    }

    async fn save_report(&self, report: NewReport) -> Result<Report> {
        let created_at = Utc::now();
        let state_text = serde_json::to_string(&report.state)
            .map_err(|e| Error::storage(format!("failed to serialize report state: {e}")))?;

        let result = sqlx::query(
            "insert into reports
               (monitor_id, created_at, change_significance, message, checksum, state)
             values (?, ?, ?, ?, ?, ?)",
        )
        .bind(report.monitor_id.as_i64())
        .bind(created_at)
        .bind(i64::from(report.significance.level()))
        .bind(&report.message)
        .bind(&report.checksum)
        .bind(&state_text)
        .execute(&self.pool)
        .await?;

        Ok(Report {
            id: ReportId::new(result.last_insert_rowid()),
            monitor_id: report.monitor_id,
            created_at,
            significance: report.significance,
            message: report.message,
            checksum: report.checksum,
            state: report.state,
        })
    }
}
