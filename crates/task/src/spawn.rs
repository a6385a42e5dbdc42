//! Process spawning behind a narrow trait
//!
//! The scheduler never talks to the operating system directly: it hands an
//! [`ExecSpec`] to a [`Spawner`] and waits for the exit code. The
//! production implementation launches the process with tokio and streams
//! stdout/stderr line by line onto the event bus; tests substitute a
//! deterministic implementation.

use async_trait::async_trait;
use convoy_core::{EventBus, TaskEvent};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::task::ExecSpec;

/// Exit code reported when a process could not be launched at all
pub const SPAWN_FAILURE_CODE: i32 = 127;

/// Launches one task's process work and reports its exit code
///
/// A non-zero code marks the task failed; errors while launching are
/// reported as [`SPAWN_FAILURE_CODE`] with the message streamed as error
/// output, because execution failures are data rather than errors.
#[async_trait]
pub trait Spawner: Send + Sync {
    async fn spawn(&self, id: usize, spec: ExecSpec, events: EventBus, label: String) -> i32;
}

/// Production spawner backed by `tokio::process`
#[derive(Debug, Default)]
pub struct ProcessSpawner;

impl ProcessSpawner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Spawner for ProcessSpawner {
    async fn spawn(&self, id: usize, spec: ExecSpec, events: EventBus, label: String) -> i32 {
        let mut command = Command::new(&spec.command);
        command
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(task = %label, command = %spec.command, error = %e, "failed to spawn");
                events.task(TaskEvent::ErrorOutput {
                    id,
                    label,
                    line: format!("failed to spawn '{}': {e}", spec.command),
                });
                return SPAWN_FAILURE_CODE;
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        tokio::join!(
            stream_lines(stdout, events.clone(), id, label.clone(), false),
            stream_lines(stderr, events.clone(), id, label.clone(), true),
        );

        match child.wait().await {
            Ok(status) => status.code().unwrap_or(-1),
            Err(e) => {
                tracing::error!(task = %label, error = %e, "failed waiting for process");
                events.task(TaskEvent::ErrorOutput {
                    id,
                    label,
                    line: format!("failed waiting for process: {e}"),
                });
                -1
            }
        }
    }
}

/// Forward a pipe onto the bus, one line per event
async fn stream_lines<R>(reader: Option<R>, events: EventBus, id: usize, label: String, is_err: bool)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else { return };
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let event = if is_err {
            TaskEvent::ErrorOutput {
                id,
                label: label.clone(),
                line,
            }
        } else {
            TaskEvent::Output {
                id,
                label: label.clone(),
                line,
            }
        };
        events.task(event);
    }
}

/// Deterministic spawner for tests: completes immediately with a scripted
/// exit code per label (default 0) and records launch order
#[cfg(test)]
pub(crate) struct ScriptedSpawner {
    codes: std::sync::Mutex<std::collections::HashMap<String, i32>>,
    launched: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl ScriptedSpawner {
    pub fn new() -> Self {
        Self {
            codes: std::sync::Mutex::new(std::collections::HashMap::new()),
            launched: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Make the task with this label exit with `code`
    pub fn exit_with(self, label: &str, code: i32) -> Self {
        self.codes.lock().unwrap().insert(label.to_string(), code);
        self
    }

    pub fn launched(&self) -> Vec<String> {
        self.launched.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Spawner for ScriptedSpawner {
    async fn spawn(&self, _id: usize, _spec: ExecSpec, _events: EventBus, label: String) -> i32 {
        self.launched.lock().unwrap().push(label.clone());
        self.codes.lock().unwrap().get(&label).copied().unwrap_or(0)
    }
}
