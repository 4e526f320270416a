//! Run ledger tests over complete runs.

mod common;

use ce_core::ledger::RunLedger;
use ce_core::ledger::REPORT_ARTIFACT;
use ce_core::registry::StageRegistry;
use ce_protocol::ArtifactKind;
use common::*;
use std::sync::Arc;

#[tokio::test]
async fn test_success_flag_follows_report_artifact() {
    let run = provision(test_settings(2));
    let registry = StageRegistry::standard();
    let orchestrator = run.orchestrator(Arc::new(happy_path_model()));
    collect_events(orchestrator.run(run.initial_state(&registry), run.settings.run_configuration()))
        .await;

    assert!(run_summary(&run.ledger, run.run_id()).success);

    std::fs::remove_file(run.ledger.run_dir(run.run_id()).join(REPORT_ARTIFACT))
        .expect("remove report");

    assert!(!run_summary(&run.ledger, run.run_id()).success);
}

#[tokio::test]
async fn test_runs_are_listed_separately_and_sorted() {
    let first = provision(test_settings(2));
    let ledger = first.ledger.clone();
    let second_settings = test_settings(2);
    ledger
        .provision(&second_settings, DATASET)
        .expect("second run");

    let runs = ledger.list_runs().expect("runs");
    assert_eq!(runs.len(), 2);
    assert!(runs[0].run_id < runs[1].run_id);
    for run in &runs {
        assert!(!run.success);
        let kinds: Vec<ArtifactKind> = run.artifacts.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![ArtifactKind::Config, ArtifactKind::Dataset]);
    }
}

#[test]
fn test_provisioned_settings_reload_as_run_configuration() {
    let run = provision(test_settings(4));
    let settings = run.ledger.load_settings(run.run_id()).expect("settings");
    let config = settings.run_configuration();

    assert_eq!(config.run_id, run.run_id());
    assert_eq!(config.retry_limit, 4);
    assert_eq!(config.sleep_seconds, 0);
    assert_eq!(run.ledger.load_dataset(run.run_id()).expect("dataset"), DATASET);
}
