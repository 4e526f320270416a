//! Progress events emitted by a run.
//!
//! A run produces a forward-only sequence of [`RunEvent`]s. Ordinary events
//! name the stage that just completed. Exactly one terminal event ends the
//! sequence: [`RunEvent::RunCompleted`] on success, or one of the two
//! sentinels [`RunEvent::ConfigNotSaved`] and [`RunEvent::RunFailed`].
//!
//! Failure sentinels carry no error detail; the full trace is
//! written to the run ledger.

use serde::Deserialize;
use serde::Serialize;
use ts_rs::TS;

use crate::stage_models::WorkflowStage;
use crate::state_models::HistoryRecord;

/// Label of the sentinel emitted when a run was never provisioned.
pub const CONFIG_NOT_SAVED: &str = "CONFIG_NOT_SAVED";
/// Label of the sentinel emitted when a run aborts.
pub const ERROR: &str = "ERROR";
/// Label of the successful terminal event.
pub const COMPLETED: &str = "COMPLETED";

/// Events sent from a run to its consumer.
///
/// Uses tagged enum serialization for client compatibility:
/// ```json
/// {
///   "type": "stageCompleted",
///   "payload": {
///     "run_id": "7d3c...",
///     "stage": "metadata_extraction",
///     "node_name": "Metadata Extractor Agent",
///     "elapsed_ms": 5120,
///     "record": { ... }
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum RunEvent {
    /// A stage finished and its snapshot is durably recorded.
    StageCompleted {
        run_id: String,
        stage: WorkflowStage,
        node_name: String,
        elapsed_ms: u64,
        /// The history record appended by the stage.
        record: HistoryRecord,
    },

    /// Every stage finished and the report artifact was written.
    RunCompleted {
        run_id: String,
        stages_completed: usize,
        total_elapsed_ms: u64,
    },

    /// The run identifier has no provisioned ledger directory. No stage ran.
    ConfigNotSaved { run_id: String },

    /// The run aborted. Diagnostics are in the run ledger.
    RunFailed {
        run_id: String,
        /// Stage that was executing, if any.
        stage: Option<WorkflowStage>,
    },
}

impl RunEvent {
    /// Display label: the node name for stage events, a sentinel otherwise.
    pub fn label(&self) -> &str {
        match self {
            RunEvent::StageCompleted { node_name, .. } => node_name,
            RunEvent::RunCompleted { .. } => COMPLETED,
            RunEvent::ConfigNotSaved { .. } => CONFIG_NOT_SAVED,
            RunEvent::RunFailed { .. } => ERROR,
        }
    }

    pub fn run_id(&self) -> &str {
        match self {
            RunEvent::StageCompleted { run_id, .. }
            | RunEvent::RunCompleted { run_id, .. }
            | RunEvent::ConfigNotSaved { run_id }
            | RunEvent::RunFailed { run_id, .. } => run_id,
        }
    }

    /// True for events that end the sequence.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunEvent::StageCompleted { .. })
    }

    /// True for the two failure sentinels.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            RunEvent::ConfigNotSaved { .. } | RunEvent::RunFailed { .. }
        )
    }
}
