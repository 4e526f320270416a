//! Custom assertions for run events and ledgers.

use ce_core::ledger::FileLedger;
use ce_core::ledger::RunLedger;
use ce_protocol::HistoryRecord;
use ce_protocol::RunEvent;
use ce_protocol::RunSummary;
use ce_protocol::WorkflowStage;

/// Stages of the `StageCompleted` events, in order.
pub fn completed_stages(events: &[RunEvent]) -> Vec<WorkflowStage> {
    events
        .iter()
        .filter_map(|event| match event {
            RunEvent::StageCompleted { stage, .. } => Some(*stage),
            _ => None,
        })
        .collect()
}

/// History records carried by the `StageCompleted` events, in order.
pub fn completed_records(events: &[RunEvent]) -> Vec<HistoryRecord> {
    events
        .iter()
        .filter_map(|event| match event {
            RunEvent::StageCompleted { record, .. } => Some(record.clone()),
            _ => None,
        })
        .collect()
}

/// Assert that exactly the last event is terminal and has the given label.
pub fn assert_single_terminal(events: &[RunEvent], label: &str) {
    let terminal: Vec<&RunEvent> = events.iter().filter(|event| event.is_terminal()).collect();
    assert_eq!(terminal.len(), 1, "expected one terminal event, got {events:?}");
    let last = events.last().expect("at least one event");
    assert!(last.is_terminal(), "terminal event must be last");
    assert_eq!(last.label(), label);
}

/// The ledger summary of a run.
pub fn run_summary(ledger: &FileLedger, run_id: &str) -> RunSummary {
    ledger
        .list_runs()
        .expect("list runs")
        .into_iter()
        .find(|run| run.run_id == run_id)
        .unwrap_or_else(|| panic!("run {run_id} missing from ledger"))
}
