//! Subprocess runner that reads JSON Lines from stdout.

use crate::sandbox::SandboxError;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncReadExt;
use tokio::io::BufReader;
use tokio::process::Command;
use tokio_stream::Stream;

/// One item read from the child process.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessLine {
    /// A stdout line that parsed as JSON.
    Json(serde_json::Value),
    /// A non-empty stdout line that is not JSON.
    Text(String),
    /// Emitted once after stdout closes, with the exit code and captured stderr.
    Exited { code: Option<i32>, stderr: String },
}

pub struct ProcessRunner;

impl ProcessRunner {
    /// Spawns `command` and streams its stdout line by line.
    ///
    /// The child is killed when the stream is dropped, so a caller that stops
    /// polling (cancellation, timeout) does not leak the process.
    pub fn execute(
        command: String,
        args: Vec<String>,
        working_dir: PathBuf,
    ) -> Pin<Box<dyn Stream<Item = Result<ProcessLine, SandboxError>> + Send>> {
        let stream = async_stream::stream! {
            let mut cmd = Command::new(&command);
            cmd.args(&args);
            cmd.current_dir(&working_dir);
            cmd.stdin(Stdio::null());
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());
            cmd.kill_on_drop(true);

            let mut child = match cmd.spawn() {
                Ok(child) => child,
                Err(e) => {
                    yield Err(SandboxError::Spawn(format!(
                        "Failed to spawn command '{command}': {e}"
                    )));
                    return;
                }
            };

            let (Some(stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take()) else {
                yield Err(SandboxError::Spawn("Failed to capture child output".to_string()));
                return;
            };

            let stderr_task = tokio::spawn(async move {
                let mut buffer = String::new();
                let _ = stderr.read_to_string(&mut buffer).await;
                buffer
            });

            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<serde_json::Value>(&line) {
                    Ok(value) => yield Ok(ProcessLine::Json(value)),
                    Err(_) => yield Ok(ProcessLine::Text(line)),
                }
            }

            let status = child.wait().await;
            let stderr = stderr_task.await.unwrap_or_default();
            match status {
                Ok(status) => yield Ok(ProcessLine::Exited { code: status.code(), stderr }),
                Err(e) => yield Err(SandboxError::Spawn(format!("Failed to wait for '{command}': {e}"))),
            }
        };

        Box::pin(stream)
    }
}
