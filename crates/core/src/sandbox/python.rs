//! Python interpreter sandbox.
//!
//! Each snippet runs in a fresh interpreter inside a temporary directory that
//! holds the dataset (`data.json`), the snippet and a small runner script. The
//! runner exposes the table as `df` (a pandas DataFrame when pandas is
//! installed, a list of dicts otherwise), captures stdout and prints a single
//! JSON line with the outcome.

use crate::dataset::Table;
use crate::sandbox::process::ProcessLine;
use crate::sandbox::process::ProcessRunner;
use crate::sandbox::CodeSandbox;
use crate::sandbox::SandboxError;
use crate::sandbox::SandboxOutput;
use async_trait::async_trait;
use std::time::Duration;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const RUNNER: &str = r#"import contextlib
import io
import json
import traceback

with open("data.json", encoding="utf-8") as handle:
    records = json.load(handle)
try:
    import pandas as pd
    df = pd.DataFrame.from_records(records)
except ImportError:
    pd = None
    df = records

with open("snippet.py", encoding="utf-8") as handle:
    source = handle.read()

buffer = io.StringIO()
error = None
scope = {"df": df, "pd": pd, "json": json}
try:
    with contextlib.redirect_stdout(buffer):
        exec(compile(source, "snippet.py", "exec"), scope)
except Exception:
    error = traceback.format_exc(limit=2)

print(json.dumps({"stdout": buffer.getvalue(), "error": error}))
"#;

pub struct PythonSandbox {
    interpreter: String,
    timeout: Duration,
}

impl PythonSandbox {
    pub fn new(interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }

    async fn collect_result(
        &self,
        dir: &std::path::Path,
    ) -> Result<SandboxOutput, SandboxError> {
        let mut stream = ProcessRunner::execute(
            self.interpreter.clone(),
            vec!["runner.py".to_string()],
            dir.to_path_buf(),
        );

        let mut result = None;
        let mut stray = Vec::new();
        while let Some(line) = stream.next().await {
            match line? {
                ProcessLine::Json(value) if value.get("stdout").is_some() => {
                    result = Some(SandboxOutput {
                        stdout: value["stdout"].as_str().unwrap_or_default().to_string(),
                        error: value["error"].as_str().map(str::to_string),
                    });
                }
                ProcessLine::Json(value) => stray.push(value.to_string()),
                ProcessLine::Text(text) => stray.push(text),
                ProcessLine::Exited { code, stderr } => {
                    if result.is_none() {
                        return Err(SandboxError::NoResult(format!(
                            "interpreter exited with {code:?}: {}{}",
                            stderr.trim(),
                            stray.join("\n")
                        )));
                    }
                }
            }
        }
        result.ok_or_else(|| SandboxError::NoResult("interpreter produced no output".to_string()))
    }
}

impl Default for PythonSandbox {
    fn default() -> Self {
        Self::new("python3", Duration::from_secs(60))
    }
}

#[async_trait]
impl CodeSandbox for PythonSandbox {
    async fn check_availability(&self) -> bool {
        which::which(&self.interpreter).is_ok()
    }

    async fn run(
        &self,
        code: &str,
        table: &Table,
        cancel: &CancellationToken,
    ) -> Result<SandboxOutput, SandboxError> {
        let dir = tempfile::tempdir().map_err(|e| SandboxError::Io(e.to_string()))?;
        let write = |name: &str, content: &str| {
            std::fs::write(dir.path().join(name), content)
                .map_err(|e| SandboxError::Io(format!("{name}: {e}")))
        };
        write("data.json", &table.to_records_json())?;
        write("snippet.py", code)?;
        write("runner.py", RUNNER)?;

        debug!(interpreter = %self.interpreter, bytes = code.len(), "running snippet");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SandboxError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, self.collect_result(dir.path())) => {
                outcome.map_err(|_| SandboxError::Timeout(self.timeout.as_secs()))?
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python_available() -> bool {
        which::which("python3").is_ok()
    }

    fn table() -> Table {
        Table::from_records_json(r#"[{"price": 10, "qty": 2}, {"price": 4, "qty": 5}]"#)
            .expect("table")
    }

    #[tokio::test]
    async fn test_snippet_sees_dataset() {
        if !python_available() {
            return;
        }
        let sandbox = PythonSandbox::default();
        let output = sandbox
            .run("print(len(df))", &table(), &CancellationToken::new())
            .await
            .expect("run");
        assert!(output.is_success());
        assert_eq!(output.stdout.trim(), "2");
    }

    #[tokio::test]
    async fn test_snippet_error_is_an_observation() {
        if !python_available() {
            return;
        }
        let sandbox = PythonSandbox::default();
        let output = sandbox
            .run("raise ValueError('bad column')", &table(), &CancellationToken::new())
            .await
            .expect("run");
        assert!(!output.is_success());
        assert!(output.observation().contains("ValueError: bad column"));
    }

    #[tokio::test]
    async fn test_missing_interpreter_fails_to_spawn() {
        let sandbox = PythonSandbox::new("python-that-does-not-exist", Duration::from_secs(5));
        assert!(!sandbox.check_availability().await);
        let result = sandbox
            .run("print(1)", &table(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(SandboxError::Spawn(_))));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_run() {
        let sandbox = PythonSandbox::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = sandbox.run("print(1)", &table(), &cancel).await;
        assert_eq!(result, Err(SandboxError::Cancelled));
    }
}
