//! Filesystem run ledger.
//!
//! ```text
//! logs/
//! └── <run_id>/
//!     ├── config.json
//!     ├── data.json
//!     ├── 20250101120000123-00-metadata_extraction.log
//!     ├── ...
//!     ├── error_20250101120500456.log   (failed runs)
//!     └── index.html                    (successful runs)
//! ```

use crate::ledger::classify_artifact;
use crate::ledger::LedgerError;
use crate::ledger::LedgerResult;
use crate::ledger::RunLedger;
use crate::ledger::CONFIG_ARTIFACT;
use crate::ledger::DATASET_ARTIFACT;
use crate::ledger::REPORT_ARTIFACT;
use crate::ledger::TIMESTAMP_FORMAT;
use ce_protocol::ArtifactEntry;
use ce_protocol::ArtifactKind;
use ce_protocol::RunSettings;
use ce_protocol::RunSummary;
use chrono::DateTime;
use chrono::Utc;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct FileLedger {
    root: PathBuf,
}

impl FileLedger {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(run_id)
    }

    /// Creates the run directory and saves the settings and dataset.
    ///
    /// The run id is the one allocated in `settings`.
    pub fn provision(&self, settings: &RunSettings, records_json: &str) -> LedgerResult<String> {
        check_name(&settings.run_id)?;
        let dir = self.run_dir(&settings.run_id);
        if dir.exists() {
            return Err(LedgerError::AlreadyProvisioned(settings.run_id.clone()));
        }
        fs::create_dir_all(&dir).map_err(|source| LedgerError::Io {
            action: "create",
            path: dir.clone(),
            source,
        })?;

        let config = serde_json::to_string_pretty(settings).map_err(|source| LedgerError::Json {
            path: dir.join(CONFIG_ARTIFACT),
            source,
        })?;
        write_file(&dir.join(DATASET_ARTIFACT), records_json.as_bytes())?;
        write_file(&dir.join(CONFIG_ARTIFACT), config.as_bytes())?;

        debug!(run_id = %settings.run_id, path = %dir.display(), "run provisioned");
        Ok(settings.run_id.clone())
    }

    pub fn load_settings(&self, run_id: &str) -> LedgerResult<RunSettings> {
        let path = self.provisioned_dir(run_id)?.join(CONFIG_ARTIFACT);
        let content = read_file(&path)?;
        serde_json::from_str(&content).map_err(|source| LedgerError::Json { path, source })
    }

    /// The dataset records saved at provisioning.
    pub fn load_dataset(&self, run_id: &str) -> LedgerResult<String> {
        read_file(&self.provisioned_dir(run_id)?.join(DATASET_ARTIFACT))
    }

    pub fn read_artifact(&self, run_id: &str, name: &str) -> LedgerResult<String> {
        check_name(name)?;
        let path = self.run_dir(run_id).join(name);
        if !path.is_file() {
            return Err(LedgerError::ArtifactNotFound {
                run_id: run_id.to_string(),
                name: name.to_string(),
            });
        }
        read_file(&path)
    }

    fn provisioned_dir(&self, run_id: &str) -> LedgerResult<PathBuf> {
        check_name(run_id)?;
        if !self.is_provisioned(run_id) {
            return Err(LedgerError::NotProvisioned(run_id.to_string()));
        }
        Ok(self.run_dir(run_id))
    }

    fn artifacts(&self, dir: &Path) -> LedgerResult<Vec<ArtifactEntry>> {
        let mut artifacts = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|source| LedgerError::Walk {
                path: dir.to_path_buf(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            artifacts.push(ArtifactEntry {
                kind: classify_artifact(&name),
                name,
                path: entry.path().to_path_buf(),
            });
        }
        Ok(artifacts)
    }

    fn stage_log_count(&self, dir: &Path) -> LedgerResult<usize> {
        Ok(self
            .artifacts(dir)?
            .iter()
            .filter(|artifact| artifact.kind == ArtifactKind::StageLog)
            .count())
    }
}

impl RunLedger for FileLedger {
    fn is_provisioned(&self, run_id: &str) -> bool {
        check_name(run_id).is_ok() && self.run_dir(run_id).join(CONFIG_ARTIFACT).is_file()
    }

    fn append(
        &self,
        run_id: &str,
        stage_name: &str,
        timestamp: DateTime<Utc>,
        payload: &str,
    ) -> LedgerResult<PathBuf> {
        let dir = self.provisioned_dir(run_id)?;
        let seq = self.stage_log_count(&dir)?;
        let name = format!(
            "{}-{seq:02}-{stage_name}.log",
            timestamp.format(TIMESTAMP_FORMAT)
        );
        check_name(&name)?;
        let path = dir.join(name);
        write_file(&path, payload.as_bytes())?;
        Ok(path)
    }

    fn append_error(
        &self,
        run_id: &str,
        timestamp: DateTime<Utc>,
        trace: &str,
    ) -> LedgerResult<PathBuf> {
        let dir = self.provisioned_dir(run_id)?;
        let path = dir.join(format!("error_{}.log", timestamp.format(TIMESTAMP_FORMAT)));
        write_file(&path, trace.as_bytes())?;
        Ok(path)
    }

    fn write_artifact(&self, run_id: &str, name: &str, bytes: &[u8]) -> LedgerResult<PathBuf> {
        check_name(name)?;
        let path = self.provisioned_dir(run_id)?.join(name);
        write_file(&path, bytes)?;
        Ok(path)
    }

    fn list_runs(&self) -> LedgerResult<Vec<RunSummary>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|source| LedgerError::Walk {
                path: self.root.clone(),
                source,
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }

            let artifacts = self.artifacts(entry.path())?;
            runs.push(RunSummary {
                run_id: entry.file_name().to_string_lossy().to_string(),
                success: artifacts.iter().any(|artifact| artifact.name == REPORT_ARTIFACT),
                artifacts,
            });
        }
        Ok(runs)
    }
}

fn check_name(name: &str) -> LedgerResult<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if invalid {
        return Err(LedgerError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> LedgerResult<()> {
    fs::write(path, bytes).map_err(|source| LedgerError::Io {
        action: "write",
        path: path.to_path_buf(),
        source,
    })
}

fn read_file(path: &Path) -> LedgerResult<String> {
    fs::read_to_string(path).map_err(|source| LedgerError::Io {
        action: "read",
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ce_protocol::ProblemType;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn settings() -> RunSettings {
        RunSettings::new("churned", ProblemType::Classification, "churn.json")
    }

    fn at(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, second)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn test_provision_round_trips_settings_and_dataset() {
        let dir = tempdir().expect("tempdir");
        let ledger = FileLedger::new(dir.path());
        let settings = settings();

        let run_id = ledger.provision(&settings, "[{\"a\": 1}]").expect("provision");

        assert!(ledger.is_provisioned(&run_id));
        assert_eq!(ledger.load_settings(&run_id).expect("settings"), settings);
        assert_eq!(ledger.load_dataset(&run_id).expect("dataset"), "[{\"a\": 1}]");
        assert!(matches!(
            ledger.provision(&settings, "[]"),
            Err(LedgerError::AlreadyProvisioned(_))
        ));
    }

    #[test]
    fn test_append_names_sort_in_append_order() {
        let dir = tempdir().expect("tempdir");
        let ledger = FileLedger::new(dir.path());
        let run_id = ledger.provision(&settings(), "[]").expect("provision");

        let first = ledger
            .append(&run_id, "metadata_extraction", at(0), "{}")
            .expect("append");
        let second = ledger
            .append(&run_id, "structure_creation", at(0), "{}")
            .expect("append");

        assert!(first.ends_with("20250101120000000-00-metadata_extraction.log"));
        assert!(second.ends_with("20250101120000000-01-structure_creation.log"));
    }

    #[test]
    fn test_unprovisioned_run_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let ledger = FileLedger::new(dir.path());

        assert!(!ledger.is_provisioned("missing"));
        assert!(matches!(
            ledger.append("missing", "metadata_extraction", at(0), "{}"),
            Err(LedgerError::NotProvisioned(_))
        ));
        assert!(matches!(
            ledger.load_settings("missing"),
            Err(LedgerError::NotProvisioned(_))
        ));
    }

    #[test]
    fn test_artifact_names_cannot_escape_run_dir() {
        let dir = tempdir().expect("tempdir");
        let ledger = FileLedger::new(dir.path());
        let run_id = ledger.provision(&settings(), "[]").expect("provision");

        assert!(matches!(
            ledger.write_artifact(&run_id, "../escape.html", b"x"),
            Err(LedgerError::InvalidName(_))
        ));
        assert!(matches!(
            ledger.read_artifact(&run_id, "absent.html"),
            Err(LedgerError::ArtifactNotFound { .. })
        ));
        assert!(!ledger.is_provisioned(".."));
    }

    #[test]
    fn test_list_runs_classifies_and_sorts() {
        let dir = tempdir().expect("tempdir");
        let ledger = FileLedger::new(dir.path().join("logs"));
        assert!(ledger.list_runs().expect("empty").is_empty());

        let run_id = ledger.provision(&settings(), "[]").expect("provision");
        ledger
            .append(&run_id, "metadata_extraction", at(1), "{}")
            .expect("append");
        ledger.append_error(&run_id, at(2), "trace").expect("error log");

        let runs = ledger.list_runs().expect("runs");
        assert_eq!(runs.len(), 1);
        let names: Vec<&str> = runs[0].artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "20250101120001000-00-metadata_extraction.log",
                "config.json",
                "data.json",
                "error_20250101120002000.log",
            ]
        );
        assert!(!runs[0].success);
        assert!(runs[0].has_errors());
        assert_eq!(runs[0].stage_logs().count(), 1);
    }
}
