//! Application error types.
//!
//! All errors use `thiserror` for automatic Error trait derivation. Every
//! variant is fatal for at most a single monitor invocation; the engine
//! itself keeps ticking and surfaces these through its diagnostics channel.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error enum for the monitor execution engine.
#[derive(Error, Debug)]
pub enum Error {
    /// Monitor carries an interpreter tag outside the whitelist.
    #[error("unknown interpreter: {0}")]
    UnknownInterpreter(String),

    /// Subprocess could not be started (missing interpreter, permissions).
    #[error("failed to spawn script: {0}")]
    Spawn(#[source] std::io::Error),

    /// Read or write on a child pipe failed mid-stream.
    #[error("pipe i/o error: {0}")]
    PipeIo(#[source] std::io::Error),

    /// Subprocess terminated with a non-zero exit status.
    #[error("script exited with status {0}")]
    ScriptExited(i32),

    /// Script stdout could not be parsed into a report envelope.
    #[error("malformed script output: {0}")]
    ScriptOutputMalformed(String),

    /// Subprocess exceeded the monitor's expected runtime.
    #[error("script exceeded expected runtime of {0}s")]
    ScriptTimeout(u64),

    /// Previous report envelope could not be serialized for the child.
    #[error("failed to encode report envelope: {0}")]
    EnvelopeEncode(#[source] serde_json::Error),

    /// Repository operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Admission queue is at capacity; the monitor is retried next tick.
    #[error("monitor queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// Pop on an empty admission queue.
    #[error("monitor queue is empty")]
    QueueEmpty,
}

// Convenience constructors
impl Error {
    pub fn unknown_interpreter(tag: impl Into<String>) -> Self {
        Self::UnknownInterpreter(tag.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::ScriptOutputMalformed(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
