//! Run ledger: the durable, append-only record of every run.
//!
//! A run directory holds the settings it was provisioned with, the dataset,
//! one log per executed stage, error traces and, for successful runs, the
//! HTML report. [`RunLedger`] is the interface the orchestrator writes
//! through; [`FileLedger`] implements it on the filesystem.

pub mod fs;

use ce_protocol::ArtifactKind;
use ce_protocol::RunSummary;
use chrono::DateTime;
use chrono::Utc;
use std::path::PathBuf;
use thiserror::Error;

pub use fs::FileLedger;

/// Settings snapshot written at provisioning.
pub const CONFIG_ARTIFACT: &str = "config.json";
/// Dataset records written at provisioning.
pub const DATASET_ARTIFACT: &str = "data.json";
/// Report written by the terminal stage.
pub const REPORT_ARTIFACT: &str = "index.html";

/// Timestamp layout shared by stage and error logs.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%3f";

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Run {0} has not been provisioned")]
    NotProvisioned(String),

    #[error("Run {0} already exists")]
    AlreadyProvisioned(String),

    #[error("Invalid artifact name '{0}'")]
    InvalidName(String),

    #[error("Artifact {name} not found in run {run_id}")]
    ArtifactNotFound { run_id: String, name: String },

    #[error("Failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to traverse {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Durable per-run record store.
pub trait RunLedger: Send + Sync {
    /// True once the run's settings have been saved.
    fn is_provisioned(&self, run_id: &str) -> bool;

    /// Appends a stage log and returns its path.
    fn append(
        &self,
        run_id: &str,
        stage_name: &str,
        timestamp: DateTime<Utc>,
        payload: &str,
    ) -> LedgerResult<PathBuf>;

    /// Writes an error trace and returns its path.
    fn append_error(
        &self,
        run_id: &str,
        timestamp: DateTime<Utc>,
        trace: &str,
    ) -> LedgerResult<PathBuf>;

    fn write_artifact(&self, run_id: &str, name: &str, bytes: &[u8]) -> LedgerResult<PathBuf>;

    /// Every run, sorted by run id, with artifacts sorted by name.
    fn list_runs(&self) -> LedgerResult<Vec<RunSummary>>;
}

/// Classifies a run directory entry by its file name.
pub fn classify_artifact(name: &str) -> ArtifactKind {
    match name {
        CONFIG_ARTIFACT => ArtifactKind::Config,
        DATASET_ARTIFACT => ArtifactKind::Dataset,
        REPORT_ARTIFACT => ArtifactKind::Report,
        _ if name.starts_with("error_") && name.ends_with(".log") => ArtifactKind::ErrorLog,
        _ if name.ends_with(".log") => ArtifactKind::StageLog,
        _ => ArtifactKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_artifact() {
        assert_eq!(classify_artifact("config.json"), ArtifactKind::Config);
        assert_eq!(classify_artifact("data.json"), ArtifactKind::Dataset);
        assert_eq!(classify_artifact("index.html"), ArtifactKind::Report);
        assert_eq!(
            classify_artifact("error_20250101120000123.log"),
            ArtifactKind::ErrorLog
        );
        assert_eq!(
            classify_artifact("20250101120000123-00-metadata_extraction.log"),
            ArtifactKind::StageLog
        );
        assert_eq!(classify_artifact("notes.txt"), ArtifactKind::Other);
    }
}
