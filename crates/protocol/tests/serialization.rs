use ce_protocol::*;

#[test]
fn test_run_event_wire_format_is_tagged() {
    let event = RunEvent::RunFailed {
        run_id: "run-1".to_string(),
        stage: Some(WorkflowStage::StatisticsGeneration),
    };

    let json = serde_json::to_value(&event).expect("Failed to serialize RunEvent");
    assert_eq!(json["type"], "runFailed");
    assert_eq!(json["payload"]["run_id"], "run-1");
    assert_eq!(json["payload"]["stage"], "statistics_generation");

    let back: RunEvent = serde_json::from_value(json).expect("Failed to deserialize RunEvent");
    assert_eq!(back, event);
}

#[test]
fn test_sentinel_labels_never_collide_with_node_names() {
    let sentinels = [
        RunEvent::ConfigNotSaved {
            run_id: "r".to_string(),
        },
        RunEvent::RunFailed {
            run_id: "r".to_string(),
            stage: None,
        },
    ];

    assert_eq!(sentinels[0].label(), "CONFIG_NOT_SAVED");
    assert_eq!(sentinels[1].label(), "ERROR");
    for sentinel in &sentinels {
        assert!(sentinel.is_terminal());
        assert!(sentinel.is_failure());
    }

    let completed = RunEvent::RunCompleted {
        run_id: "r".to_string(),
        stages_completed: 6,
        total_elapsed_ms: 10,
    };
    assert!(completed.is_terminal());
    assert!(!completed.is_failure());
}

#[test]
fn test_stage_output_tagging() {
    let output = StageOutput::Items(vec!["Count rows".to_string()]);
    let json = serde_json::to_string(&output).expect("Failed to serialize StageOutput");
    assert_eq!(json, r#"{"kind":"items","value":["Count rows"]}"#);

    let html: StageOutput = serde_json::from_str(r#"{"kind":"html","value":"<html></html>"}"#)
        .expect("Failed to deserialize StageOutput");
    assert_eq!(html.as_html(), Some("<html></html>"));
}

#[test]
fn test_insight_charts_are_optional() {
    let insight: Insight = serde_json::from_str(
        r#"{"name":"Seasonality","description":"Sales peak in winter"}"#,
    )
    .expect("Failed to deserialize Insight");

    assert!(insight.findings.is_empty());
    assert!(insight.charts.is_empty());
}

#[test]
fn test_agent_state_round_trip_preserves_history() {
    let mut state = AgentState::new(
        "The target column is `y` and this is a `Regression` use case.",
        r#"[{"x":1,"y":2}]"#,
        WorkflowStage::MetadataExtraction,
    );
    state.history.push(HistoryRecord {
        task: state.pending_work.clone(),
        stage: WorkflowStage::MetadataExtraction,
        run_id: "run-1".to_string(),
        outcome: HistoryOutcome::Output(StageOutput::Items(vec!["dtypes".to_string()])),
    });

    let json = serde_json::to_string(&state).expect("Failed to serialize AgentState");
    let back: AgentState = serde_json::from_str(&json).expect("Failed to deserialize AgentState");
    assert_eq!(back, state);
}

#[test]
fn test_global_config_from_toml_with_defaults() {
    let toml_str = r#"
logs_dir = "runs"

[run]
retry_limit = 5
sleep_seconds = 10

[pipeline]
stages = ["metadata_extraction", "structure_creation", "web_report_generation"]
"#;

    let config: GlobalConfig = toml::from_str(toml_str).expect("Failed to deserialize GlobalConfig");

    assert_eq!(config.logs_dir, "runs");
    assert_eq!(config.run.retry_limit, 5);
    assert_eq!(config.run.sleep_seconds, 10);
    assert_eq!(config.run.temperature, DEFAULT_TEMPERATURE);
    assert_eq!(config.model.name, DEFAULT_MODEL);
    assert_eq!(config.sandbox.python, "python3");
    assert_eq!(config.pipeline.stages.len(), 3);
    assert_eq!(config.pipeline.stages[2], WorkflowStage::WebReportGeneration);
}

#[test]
fn test_run_settings_snapshot_round_trip() {
    let settings = RunSettings::new("churned", ProblemType::Classification, "customers.json");
    let json = serde_json::to_string_pretty(&settings).expect("Failed to serialize RunSettings");
    assert!(json.contains("\"problem_type\": \"classification\""));

    let back: RunSettings = serde_json::from_str(&json).expect("Failed to deserialize RunSettings");
    assert_eq!(back, settings);
}
