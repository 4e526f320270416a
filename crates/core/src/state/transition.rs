//! Agent state transitions.
//!
//! Every function here takes the current state by reference and returns the
//! next state. Nothing is mutated in place, so a failed stage leaves its
//! input state intact for the caller.

use crate::registry::stage_spec;
use crate::registry::StageRegistry;
use ce_protocol::AgentState;
use ce_protocol::HistoryOutcome;
use ce_protocol::HistoryRecord;
use ce_protocol::RunSettings;
use ce_protocol::StageOutput;
use ce_protocol::WorkflowStage;

/// Create the state a run starts from.
///
/// # Arguments
///
/// * `settings` - The provisioned run settings, which supply the first task
/// * `records_json` - The dataset as row records
/// * `registry` - The stage sequence; the run starts at its entry stage
pub fn initial_state(
    settings: &RunSettings,
    records_json: impl Into<String>,
    registry: &StageRegistry,
) -> AgentState {
    AgentState::new(settings.initial_task(), records_json, registry.entry())
}

/// Record a successful stage and move to the next one.
///
/// Appends the history record, fills the stage's accumulator (if it has
/// one), copies the output forward as the next stage's work and advances
/// `stage` through the registry.
pub fn complete_stage(
    state: &AgentState,
    stage: WorkflowStage,
    output: StageOutput,
    run_id: &str,
    registry: &StageRegistry,
) -> AgentState {
    let mut next = state.clone();
    next.history.push(HistoryRecord {
        task: state.pending_work.clone(),
        stage,
        run_id: run_id.to_string(),
        outcome: HistoryOutcome::Output(output.clone()),
    });
    if let Some(accumulator) = stage_spec(stage).accumulator {
        *accumulator.slot_mut(&mut next) = Some(output.clone());
    }
    next.pending_work = output.work_items();
    next.stage_output = Some(output);
    next.stage = registry.next_stage(stage);
    next
}

/// Record a failed stage.
///
/// The stage does not advance and pending work is left as it was.
pub fn record_failure(
    state: &AgentState,
    stage: WorkflowStage,
    error: &str,
    run_id: &str,
) -> AgentState {
    let mut next = state.clone();
    next.history.push(HistoryRecord {
        task: state.pending_work.clone(),
        stage,
        run_id: run_id.to_string(),
        outcome: HistoryOutcome::Error(error.to_string()),
    });
    next
}
