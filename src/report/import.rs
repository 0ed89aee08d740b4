//! Envelope import - parsing a child's stdout back into a wire record.
//!
//! Scripts are written in three different languages by many hands, so the
//! numeric significance field is decoded tolerantly: integers and floats are
//! both accepted, floats are truncated, and out-of-range levels are clamped
//! onto the closed set (that lives on [`Significance`]'s own `Deserialize`).
//! Everything else is strict - all four fields must be present or the output
//! is rejected.

use serde::Deserialize;

use super::{ReportEnvelope, Significance, StateMap};
use crate::types::{Error, Result};

#[derive(Debug, Deserialize)]
struct WireRecord {
    #[serde(rename = "lastChangeSignificance")]
    last_change_significance: Significance,
    message: String,
    checksum: String,
    state: StateMap,
}

/// Parse the first JSON record on the child's stdout.
///
/// Trailing bytes after the record are ignored, matching a stream decoder
/// reading a single value.
pub fn from_stdout_bytes(bytes: &[u8]) -> Result<ReportEnvelope> {
    let mut stream = serde_json::Deserializer::from_slice(bytes).into_iter::<WireRecord>();
    let record = match stream.next() {
        Some(Ok(record)) => record,
        Some(Err(err)) => return Err(Error::malformed(err.to_string())),
        None => return Err(Error::malformed("script produced no output")),
    };

    Ok(ReportEnvelope {
        significance: record.last_change_significance,
        message: record.message,
        checksum: record.checksum,
        state: record.state,
    })
}
