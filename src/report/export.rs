//! Envelope export - serializing the wire record for a child's stdin.

use serde::Serialize;

use super::{ReportEnvelope, StateMap};
use crate::types::{Error, Result};

/// The wire record. Field names are the subprocess contract; internal ids and
/// timestamps are deliberately absent.
#[derive(Debug, Serialize)]
struct WireRecord<'a> {
    #[serde(rename = "lastChangeSignificance")]
    last_change_significance: u8,
    message: &'a str,
    checksum: &'a str,
    state: &'a StateMap,
}

/// Serialize an envelope into the bytes written to the child's stdin.
///
/// The record is terminated with a newline so line-oriented scripts can read
/// it with a single `readline`.
pub fn to_stdin_bytes(envelope: &ReportEnvelope) -> Result<Vec<u8>> {
    let record = WireRecord {
        last_change_significance: envelope.significance.level(),
        message: &envelope.message,
        checksum: &envelope.checksum,
        state: &envelope.state,
    };
    let mut bytes = serde_json::to_vec(&record).map_err(Error::EnvelopeEncode)?;
    bytes.push(b'\n');
    Ok(bytes)
}
