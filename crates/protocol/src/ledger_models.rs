//! Run ledger listings and per-stage snapshots.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use std::path::PathBuf;
use ts_rs::TS;

use crate::stage_models::StageOutput;
use crate::stage_models::WorkflowStage;
use crate::state_models::HistoryRecord;

/// What a file in a run directory holds, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Config,
    Dataset,
    StageLog,
    ErrorLog,
    Report,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct ArtifactEntry {
    pub name: String,
    pub kind: ArtifactKind,
    #[ts(type = "string")]
    pub path: PathBuf,
}

/// One run directory as seen by the history browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct RunSummary {
    pub run_id: String,
    /// True iff the report artifact is present.
    pub success: bool,
    /// Artifacts sorted by name.
    pub artifacts: Vec<ArtifactEntry>,
}

impl RunSummary {
    pub fn stage_logs(&self) -> impl Iterator<Item = &ArtifactEntry> {
        self.artifacts
            .iter()
            .filter(|artifact| artifact.kind == ArtifactKind::StageLog)
    }

    pub fn has_errors(&self) -> bool {
        self.artifacts
            .iter()
            .any(|artifact| artifact.kind == ArtifactKind::ErrorLog)
    }
}

/// Payload written to the ledger after each stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct StageSnapshot {
    pub run_id: String,
    pub stage: WorkflowStage,
    pub node_name: String,
    pub recorded_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub record: HistoryRecord,
    pub metadata: Option<StageOutput>,
    pub statistics: Option<StageOutput>,
    pub insights: Option<StageOutput>,
    /// Stage that runs next; `None` once the sequence is exhausted.
    pub next_stage: Option<WorkflowStage>,
}
