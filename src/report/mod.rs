//! Reports - the structured artifact produced and consumed by each run.
//!
//! Two record shapes live here and must not be conflated:
//! - [`ReportEnvelope`] is the wire record exchanged with a script over
//!   stdin/stdout: exactly four public fields, nothing else.
//! - [`Report`] is the persisted record: the wire fields plus the store
//!   identifier, owning monitor, and creation timestamp.
//!
//! The `state` map is opaque to the engine: it is carried to and from the
//! subprocess verbatim so scripts can thread arbitrary data between runs.
//! Persisted reports are append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{MonitorId, ReportId};

pub mod export;
pub mod import;

/// Opaque script state carried between invocations.
pub type StateMap = serde_json::Map<String, serde_json::Value>;

/// Degree of change observed on a monitored site, ordered from "nothing" to
/// "the page is gone".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Significance {
    #[default]
    NoChange,
    MinorUpdate,
    ContentChange,
    Rewritten,
    Deleted,
}

impl Significance {
    /// Numeric level used on the wire and in the store.
    pub const fn level(self) -> u8 {
        match self {
            Significance::NoChange => 0,
            Significance::MinorUpdate => 1,
            Significance::ContentChange => 2,
            Significance::Rewritten => 3,
            Significance::Deleted => 4,
        }
    }

    /// Map a raw level onto the closed set. Negative input maps to
    /// [`Significance::NoChange`]; anything above the known range clamps to
    /// [`Significance::Deleted`].
    pub fn from_level(raw: i64) -> Self {
        match raw {
            i64::MIN..=0 => Significance::NoChange,
            1 => Significance::MinorUpdate,
            2 => Significance::ContentChange,
            3 => Significance::Rewritten,
            _ => Significance::Deleted,
        }
    }

    /// Human-readable label shown to administrators.
    pub const fn label(self) -> &'static str {
        match self {
            Significance::NoChange => "No Change",
            Significance::MinorUpdate => "Updated",
            Significance::ContentChange => "Changed",
            Significance::Rewritten => "Rewritten",
            Significance::Deleted => "Deleted",
        }
    }
}

impl From<Significance> for u8 {
    fn from(s: Significance) -> Self {
        s.level()
    }
}

impl From<u8> for Significance {
    fn from(raw: u8) -> Self {
        Self::from_level(i64::from(raw))
    }
}

/// Serializes as its numeric level.
impl Serialize for Significance {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(self.level())
    }
}

/// Deserializes tolerantly, the same way the wire does: integer or float,
/// floats truncated toward zero, out-of-range levels clamped onto the
/// closed set.
impl<'de> Deserialize<'de> for Significance {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = f64::deserialize(deserializer)?;
        Ok(Significance::from_level(raw.trunc() as i64))
    }
}

/// Wire record exchanged with a monitor script.
///
/// Serialized to the child's stdin before it runs and parsed back from its
/// stdout afterwards. Internal identifiers and timestamps never cross the
/// pipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReportEnvelope {
    pub significance: Significance,
    pub message: String,
    pub checksum: String,
    pub state: StateMap,
}

impl ReportEnvelope {
    /// Envelope handed to a monitor that has never produced a report.
    pub fn seed() -> Self {
        Self {
            significance: Significance::NoChange,
            message: "first run".to_string(),
            checksum: String::new(),
            state: StateMap::new(),
        }
    }

    /// Serialize for delivery on the child's stdin.
    pub fn to_stdin_bytes(&self) -> crate::types::Result<Vec<u8>> {
        export::to_stdin_bytes(self)
    }

    /// Parse a child's stdout back into an envelope.
    pub fn from_stdout_bytes(bytes: &[u8]) -> crate::types::Result<Self> {
        import::from_stdout_bytes(bytes)
    }
}

/// Persisted report row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub monitor_id: MonitorId,
    pub created_at: DateTime<Utc>,
    pub significance: Significance,
    pub message: String,
    pub checksum: String,
    pub state: StateMap,
}

impl Report {
    /// The wire view of this report, used as the next invocation's input.
    pub fn to_envelope(&self) -> ReportEnvelope {
        ReportEnvelope {
            significance: self.significance,
            message: self.message.clone(),
            checksum: self.checksum.clone(),
            state: self.state.clone(),
        }
    }
}

/// A report about to be appended; the store assigns the id and timestamp.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub monitor_id: MonitorId,
    pub significance: Significance,
    pub message: String,
    pub checksum: String,
    pub state: StateMap,
}

impl NewReport {
    pub fn from_envelope(monitor_id: MonitorId, envelope: ReportEnvelope) -> Self {
        Self {
            monitor_id,
            significance: envelope.significance,
            message: envelope.message,
            checksum: envelope.checksum,
            state: envelope.state,
        }
    }

    /// Seed record persisted the first time a monitor is dispatched.
    pub fn seed(monitor_id: MonitorId) -> Self {
        Self::from_envelope(monitor_id, ReportEnvelope::seed())
    }
}
