//! Monitor descriptors.
//!
//! A monitor is the persistent rule for a recurring script execution: which
//! interpreter to run, where the script lives, and how long to wait between
//! runs. Rows are owned by the backing store; the engine holds value copies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::types::{MonitorId, RequestId, UserId};

/// Interpreter tag carried by a monitor row.
///
/// The tag is kept as its raw string because rows may carry values outside
/// the whitelist; resolution to a runnable command happens through
/// [`Interpreter::command`], which is the only path to the shell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Interpreter(String);

impl Interpreter {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn python() -> Self {
        Self("python".to_string())
    }

    pub fn ruby() -> Self {
        Self("ruby".to_string())
    }

    pub fn perl() -> Self {
        Self("perl".to_string())
    }

    /// Resolve the tag to an external command through the whitelist.
    ///
    /// Returns `None` for any tag outside {python, ruby, perl}; the tag
    /// itself is never handed to the shell.
    pub fn command(&self) -> Option<&'static str> {
        match self.0.as_str() {
            "python" => Some("python"),
            "ruby" => Some("ruby"),
            "perl" => Some("perl"),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persistent descriptor of a recurring script execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: MonitorId,
    /// The satisfied request this monitor was created for (opaque here).
    pub request_id: RequestId,
    /// The administrator who uploaded the script (opaque here).
    pub created_by: UserId,
    pub interpreter: Interpreter,
    pub script_path: PathBuf,
    pub created_at: DateTime<Utc>,
    /// `None` until the watcher first dispatches the monitor.
    pub last_ran_at: Option<DateTime<Utc>>,
    /// Minimum whole minutes between runs.
    pub wait_period_minutes: u32,
    /// Soft runtime hint; `> 0` is enforced as a hard cap on the subprocess.
    pub expected_runtime_secs: u32,
}

impl Monitor {
    /// Eligibility predicate: whole minutes since the last run have reached
    /// the wait period. Elapsed time is floored to whole minutes, never
    /// rounded away before the comparison. A monitor that has never run is
    /// immediately eligible.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        match self.last_ran_at {
            None => true,
            Some(last) => (now - last).num_minutes() >= i64::from(self.wait_period_minutes),
        }
    }
}

/// Fields for a monitor about to be inserted; the store assigns the id and
/// creation timestamp.
#[derive(Debug, Clone)]
pub struct NewMonitor {
    pub request_id: RequestId,
    pub created_by: UserId,
    pub interpreter: Interpreter,
    pub script_path: PathBuf,
    pub wait_period_minutes: u32,
    pub expected_runtime_secs: u32,
}
