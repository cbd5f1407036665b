//! Process step runner
//!
//! Runs one step's script as a child process and turns its output into
//! `StepOutput` events. Stdout and stderr are attached to the write end of a
//! single pipe, so consumers see one interleaved stream in the order the
//! child wrote it.
//!
//! Two tasks cooperate per step: a blocking reader drains the pipe while the
//! step task waits for the child to exit. Both are joined before
//! [`StepRunner::run_step`] returns, so no output event can follow the
//! step's terminal event.

use dcd_core::{Event, Step};
use std::io::{ErrorKind, Read};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::{Config, DEFAULT_READ_CHUNK_SIZE};

/// Failure of a step, whatever the cause
///
/// Spawn errors, output read errors, timeouts and non-zero exits all surface
/// as this one error; the cause is only carried in the message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("command failed: {reason}")]
pub struct StepError {
    reason: String,
}

impl StepError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Executes steps as child processes
#[derive(Debug, Clone)]
pub struct StepRunner {
    read_chunk_size: usize,
    timeout: Option<Duration>,
}

impl Default for StepRunner {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            timeout: None,
        }
    }
}

impl StepRunner {
    pub fn new(config: &Config) -> Self {
        Self {
            read_chunk_size: config.read_chunk_size.max(1),
            timeout: config.step_timeout,
        }
    }

    /// Runs `step` with exactly the variables in `env`
    ///
    /// `env` holds `KEY=VALUE` entries; nothing is inherited implicitly and
    /// a later entry wins over an earlier one with the same key.
    pub async fn run_step(
        &self,
        env: &[String],
        step: &Step,
        events: &mpsc::Sender<Event>,
    ) -> Result<(), StepError> {
        debug!("Spawning {} for step '{}'", step.script, step.name);

        let (reader, writer) = std::io::pipe()
            .map_err(|e| StepError::new(format!("failed to create output pipe: {}", e)))?;

        // The command owns the parent's copies of the write end; dropping it
        // after spawn leaves the child as the only writer, so the reader sees
        // end-of-input once the child (and anything it forked) exits.
        let mut child = {
            let stderr = writer
                .try_clone()
                .map_err(|e| StepError::new(format!("failed to create output pipe: {}", e)))?;

            let mut command = Command::new(&step.script);
            command
                .env_clear()
                .stdin(Stdio::null())
                .stdout(writer)
                .stderr(stderr)
                .process_group(0)
                .kill_on_drop(true);

            for (key, value) in env.iter().filter_map(|entry| split_env_entry(entry)) {
                command.env(key, value);
            }

            command
                .spawn()
                .map_err(|e| StepError::new(format!("failed to start {}: {}", step.script, e)))?
        };

        let step_name = step.name.clone();
        let sender = events.clone();
        let chunk_size = self.read_chunk_size;
        let drain = tokio::task::spawn_blocking(move || {
            let mut consumer_gone = false;
            forward_output(reader, chunk_size, |text| {
                if consumer_gone {
                    return;
                }
                if sender
                    .blocking_send(Event::step_output(step_name.as_str(), text))
                    .is_err()
                {
                    warn!("Event consumer went away, discarding output of '{}'", step_name);
                    consumer_gone = true;
                }
            })
        });

        let wait = async {
            let status = match self.timeout {
                None => child.wait().await,
                Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                    Ok(status) => status,
                    Err(_) => {
                        warn!("Step '{}' timed out after {:?}, killing it", step.name, limit);
                        kill_step(&mut child, &step.name).await;
                        return Err(StepError::new(format!("timed out after {:?}", limit)));
                    }
                },
            };

            let status = status.map_err(|e| StepError::new(format!("failed to wait: {}", e)))?;
            if !status.success() {
                return Err(StepError::new(status.to_string()));
            }
            Ok(())
        };

        let (exit, drained) = tokio::join!(wait, drain);

        exit?;
        drained
            .map_err(|e| StepError::new(format!("output reader failed: {}", e)))?
            .map_err(|e| StepError::new(format!("reading command output failed: {}", e)))?;

        Ok(())
    }
}

/// Kills a step together with everything it started
///
/// The step leads its own process group, so signalling the group also reaches
/// descendants that still hold the output pipe open.
async fn kill_step(child: &mut Child, step_name: &str) {
    if let Some(pid) = child.id() {
        // SAFETY: killpg only sends a signal; the group id is our child's pid.
        let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
        if rc != 0 {
            warn!(
                "Failed to kill process group of step '{}': {}",
                step_name,
                std::io::Error::last_os_error()
            );
        }
    }

    if let Err(e) = child.kill().await {
        warn!("Failed to kill step '{}': {}", step_name, e);
    }
}

/// Splits `KEY=VALUE` at the first `=`
fn split_env_entry(entry: &str) -> Option<(&str, &str)> {
    match entry.split_once('=') {
        Some((key, value)) if !key.is_empty() => Some((key, value)),
        _ => {
            warn!("Ignoring malformed environment entry {:?}", entry);
            None
        }
    }
}

/// Reads `reader` to end-of-input, emitting complete lines as they arrive
///
/// Each emission holds every full line received since the previous one; a
/// trailing partial line is held back until more bytes arrive, or emitted on
/// its own at end-of-input.
pub(crate) fn forward_output<R, F>(mut reader: R, chunk_size: usize, mut emit: F) -> std::io::Result<()>
where
    R: Read,
    F: FnMut(String),
{
    let mut buffer = vec![0u8; chunk_size];
    let mut lines = LineChunker::default();

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        if let Some(text) = lines.push(&buffer[..read]) {
            emit(text);
        }
    }

    if let Some(rest) = lines.finish() {
        emit(rest);
    }

    Ok(())
}

/// Re-segments a byte stream on newline boundaries
///
/// Bytes are only decoded once a line is complete, so a multi-byte character
/// split across two reads is decoded intact.
#[derive(Debug, Default)]
struct LineChunker {
    pending: Vec<u8>,
}

impl LineChunker {
    fn push(&mut self, bytes: &[u8]) -> Option<String> {
        self.pending.extend_from_slice(bytes);

        let end = self.pending.iter().rposition(|&b| b == b'\n')? + 1;
        let partial = self.pending.split_off(end);
        let complete = std::mem::replace(&mut self.pending, partial);

        Some(String::from_utf8_lossy(&complete).into_owned())
    }

    fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.pending).into_owned())
        }
    }
}
