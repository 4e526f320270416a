//! Agent state threaded through every stage of a run.

use serde::Deserialize;
use serde::Serialize;
use ts_rs::TS;

use crate::stage_models::StageOutput;
use crate::stage_models::WorkflowStage;

/// What a single executor invocation produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum HistoryOutcome {
    Output(StageOutput),
    Error(String),
}

/// One append-only history entry, written per executor invocation.
///
/// Records carry no wall-clock data, so replaying identical model replies
/// yields identical history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct HistoryRecord {
    /// The work items the stage was asked to process.
    pub task: Vec<String>,
    pub stage: WorkflowStage,
    pub run_id: String,
    pub outcome: HistoryOutcome,
}

impl HistoryRecord {
    pub fn output(&self) -> Option<&StageOutput> {
        match &self.outcome {
            HistoryOutcome::Output(output) => Some(output),
            HistoryOutcome::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, HistoryOutcome::Error(_))
    }
}

/// The unit of work passed between stages.
///
/// `pending_work` is the input of the stage about to run; `stage_output` is
/// the output of the stage that just finished. On completion the output is
/// copied forward into `pending_work`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct AgentState {
    pub pending_work: Vec<String>,
    #[serde(default)]
    pub stage_output: Option<StageOutput>,
    /// Set once by structure creation.
    #[serde(default)]
    pub metadata: Option<StageOutput>,
    /// Set once by statistics generation.
    #[serde(default)]
    pub statistics: Option<StageOutput>,
    /// Set once by business insight generation.
    #[serde(default)]
    pub insights: Option<StageOutput>,
    /// Dataset as a JSON array of row records.
    pub df: String,
    /// Stage about to run; `None` once the sequence is exhausted.
    pub stage: Option<WorkflowStage>,
    #[serde(default)]
    pub history: Vec<HistoryRecord>,
}

impl AgentState {
    /// Creates a fresh state with empty accumulators.
    pub fn new(task: impl Into<String>, df: impl Into<String>, entry: WorkflowStage) -> Self {
        Self {
            pending_work: vec![task.into()],
            stage_output: None,
            metadata: None,
            statistics: None,
            insights: None,
            df: df.into(),
            stage: Some(entry),
            history: Vec::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.stage.is_none()
    }

    /// Number of stages that completed successfully.
    pub fn completed_stages(&self) -> usize {
        self.history.iter().filter(|record| !record.is_error()).count()
    }

    /// Stages in the order they completed.
    pub fn completed_sequence(&self) -> Vec<WorkflowStage> {
        self.history
            .iter()
            .filter(|record| !record.is_error())
            .map(|record| record.stage)
            .collect()
    }
}
