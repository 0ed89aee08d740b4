//! Script runner - one monitor invocation against a child process.
//!
//! The engine hands the child its previous report envelope on stdin, the
//! child prints a new envelope on stdout and exits zero. Stdin delivery and
//! stdout consumption have to make progress at the same time: a child that
//! has not read its input yet cannot produce output, and an engine blocked
//! writing a large envelope into a full pipe would never reach the read. The
//! writer therefore runs on its own task, started before the read begins.
//!
//! Exactly one message is delivered per invocation, on exactly one of the two
//! channels. [`execute`] never touches the channels; the single `match` in
//! [`run_monitor_script`] is the only publisher.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::monitor::Monitor;
use crate::report::ReportEnvelope;
use crate::types::{Error, MonitorId, Result};

/// Envelope produced by a successful invocation, ready to persist.
#[derive(Debug)]
pub struct CompletedRun {
    pub monitor: Monitor,
    pub envelope: ReportEnvelope,
}

/// Why an invocation produced no report.
#[derive(Debug)]
pub struct FailedRun {
    pub monitor_id: MonitorId,
    pub error: Error,
}

/// Execute one monitor once and deliver the outcome.
///
/// Channel closure (watcher already shut down) discards the delivery; the
/// run itself is not an error.
pub async fn run_monitor_script(
    monitor: Monitor,
    previous: ReportEnvelope,
    results: mpsc::Sender<CompletedRun>,
    errors: mpsc::Sender<FailedRun>,
) {
    match execute(&monitor, &previous).await {
        Ok(envelope) => {
            if results
                .send(CompletedRun { monitor, envelope })
                .await
                .is_err()
            {
                tracing::debug!("result channel closed before delivery");
            }
        }
        Err(error) => {
            let failed = FailedRun {
                monitor_id: monitor.id,
                error,
            };
            if errors.send(failed).await.is_err() {
                tracing::debug!("error channel closed before delivery");
            }
        }
    }
}

async fn execute(monitor: &Monitor, previous: &ReportEnvelope) -> Result<ReportEnvelope> {
    // Whitelist resolution; the tag itself never reaches the shell.
    let command = monitor
        .interpreter
        .command()
        .ok_or_else(|| Error::unknown_interpreter(monitor.interpreter.as_str()))?;

    let payload = previous.to_stdin_bytes()?;

    let mut child = Command::new(command)
        .arg(&monitor.script_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(Error::Spawn)?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| Error::PipeIo(std::io::Error::other("child stdin was not piped")))?;
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::PipeIo(std::io::Error::other("child stdout was not piped")))?;

    // Writer task: stream the previous envelope in, then close our end so
    // the child sees EOF. Must be running before the read below starts.
    let writer = tokio::spawn(async move {
        stdin.write_all(&payload).await?;
        stdin.shutdown().await?;
        Ok::<(), std::io::Error>(())
    });

    let mut output = Vec::new();
    let run = async {
        stdout
            .read_to_end(&mut output)
            .await
            .map_err(Error::PipeIo)?;
        child.wait().await.map_err(Error::PipeIo)
    };

    let cap_secs = u64::from(monitor.expected_runtime_secs);
    let outcome = if cap_secs > 0 {
        timeout(Duration::from_secs(cap_secs), run).await
    } else {
        Ok(run.await)
    };

    let status = match outcome {
        Ok(result) => result?,
        Err(_elapsed) => {
            writer.abort();
            if let Err(err) = child.start_kill() {
                tracing::warn!(
                    "failed_to_kill_timed_out_script: monitor={}, error={}",
                    monitor.id,
                    err
                );
            }
            let _ = child.wait().await;
            return Err(Error::ScriptTimeout(cap_secs));
        }
    };

    // A script may legitimately exit without draining its stdin; a write
    // failure only matters if it also broke the run, and that surfaces
    // through the exit status or the parse below.
    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            tracing::warn!("stdin_write_failed: monitor={}, error={}", monitor.id, err);
        }
        Err(join_err) => {
            tracing::warn!(
                "stdin_writer_panicked: monitor={}, error={}",
                monitor.id,
                join_err
            );
        }
    }

    if !status.success() {
        return Err(Error::ScriptExited(status.code().unwrap_or(-1)));
    }

    ReportEnvelope::from_stdout_bytes(&output)
}
