//! Code execution bound to a run's dataset.
//!
//! The code-execution stage lets the model compute values instead of
//! guessing them. A [`CodeSandbox`] runs one snippet against the table and
//! returns what it printed. Errors raised by the snippet itself come back as
//! an unsuccessful [`SandboxOutput`] so the model can correct its code; only
//! infrastructure failures are [`SandboxError`]s.

pub mod process;
pub mod python;

use crate::dataset::Table;
use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use python::PythonSandbox;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SandboxError {
    #[error("Sandbox not available: {0}")]
    NotAvailable(String),
    #[error("{0}")]
    Spawn(String),
    #[error("Sandbox I/O failed: {0}")]
    Io(String),
    #[error("Snippet exceeded the {0}s time limit")]
    Timeout(u64),
    #[error("Sandbox produced no result: {0}")]
    NoResult(String),
    #[error("Code execution cancelled")]
    Cancelled,
}

/// Result of one snippet run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxOutput {
    pub stdout: String,
    /// Exception raised by the snippet, if any.
    pub error: Option<String>,
}

impl SandboxOutput {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Text fed back to the model as the observation.
    pub fn observation(&self) -> String {
        match &self.error {
            None if self.stdout.trim().is_empty() => "(no output)".to_string(),
            None => self.stdout.trim_end().to_string(),
            Some(error) => format!("{}\nERROR: {error}", self.stdout.trim_end())
                .trim_start()
                .to_string(),
        }
    }
}

#[async_trait]
pub trait CodeSandbox: Send + Sync {
    async fn check_availability(&self) -> bool;

    async fn run(
        &self,
        code: &str,
        table: &Table,
        cancel: &CancellationToken,
    ) -> Result<SandboxOutput, SandboxError>;
}

/// A sandbox that refuses to run code.
///
/// Used when no interpreter is configured; stages that need code execution
/// fail with a clear error instead of silently skipping work.
pub struct DisabledSandbox;

#[async_trait]
impl CodeSandbox for DisabledSandbox {
    async fn check_availability(&self) -> bool {
        false
    }

    async fn run(
        &self,
        _code: &str,
        _table: &Table,
        _cancel: &CancellationToken,
    ) -> Result<SandboxOutput, SandboxError> {
        Err(SandboxError::NotAvailable(
            "code execution is disabled".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_formats() {
        let ok = SandboxOutput {
            stdout: "42\n".to_string(),
            error: None,
        };
        assert_eq!(ok.observation(), "42");

        let silent = SandboxOutput {
            stdout: String::new(),
            error: None,
        };
        assert_eq!(silent.observation(), "(no output)");

        let failed = SandboxOutput {
            stdout: String::new(),
            error: Some("KeyError: 'price'".to_string()),
        };
        assert!(!failed.is_success());
        assert_eq!(failed.observation(), "ERROR: KeyError: 'price'");
    }
}
