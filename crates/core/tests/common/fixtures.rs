//! Test fixtures: datasets, provisioned runs and scripted models.

use ce_core::engine::Orchestrator;
use ce_core::engine::RunStream;
use ce_core::ledger::FileLedger;
use ce_core::models::ScriptedModel;
use ce_core::registry::StageRegistry;
use ce_core::sandbox::DisabledSandbox;
use ce_core::state::transition::initial_state;
use ce_protocol::AgentState;
use ce_protocol::ProblemType;
use ce_protocol::RunEvent;
use ce_protocol::RunSettings;
use ce_protocol::WorkflowStage;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_stream::StreamExt;

/// A small churn dataset in row-record form.
pub const DATASET: &str = r#"[
    {"customer": "a", "age": 31, "income": 52000, "churned": "yes"},
    {"customer": "b", "age": 45, "income": 61000, "churned": "no"},
    {"customer": "c", "age": 27, "income": 38000, "churned": "yes"},
    {"customer": "d", "age": 52, "income": null, "churned": "no"}
]"#;

pub const REPORT_HTML: &str =
    "<!DOCTYPE html><html><body><h1>Churn report</h1><p>Income drives churn.</p></body></html>";

/// A provisioned run in a temporary ledger.
///
/// Keep the value alive for the duration of the test; dropping it removes
/// the ledger directory.
pub struct TestRun {
    pub dir: TempDir,
    pub ledger: Arc<FileLedger>,
    pub settings: RunSettings,
}

impl TestRun {
    pub fn run_id(&self) -> &str {
        &self.settings.run_id
    }

    pub fn initial_state(&self, registry: &StageRegistry) -> AgentState {
        initial_state(&self.settings, DATASET, registry)
    }

    pub fn orchestrator(&self, model: Arc<ScriptedModel>) -> Orchestrator {
        Orchestrator::new(model, Arc::new(DisabledSandbox), self.ledger.clone())
    }
}

/// Settings for a churn classification run with fast retries.
pub fn test_settings(retry_limit: u32) -> RunSettings {
    let mut settings = RunSettings::new("churned", ProblemType::Classification, "churn.json");
    settings.retry_limit = retry_limit;
    settings.sleep_seconds = 0;
    settings
}

/// Provision `settings` in a fresh temporary ledger.
pub fn provision(settings: RunSettings) -> TestRun {
    let dir = tempfile::tempdir().expect("tempdir");
    let ledger = Arc::new(FileLedger::new(dir.path().join("logs")));
    ledger.provision(&settings, DATASET).expect("provision run");
    TestRun {
        dir,
        ledger,
        settings,
    }
}

/// Replies for one successful pass over the standard registry.
pub fn happy_path_model() -> ScriptedModel {
    ScriptedModel::new()
        .with_reply(
            WorkflowStage::MetadataExtraction,
            r#"{"output_format": ["How many rows are there?", "Which columns contain nulls?"]}"#,
        )
        .with_reply(
            WorkflowStage::StructureCreation,
            "```json\n{\"output_format\": \"4 customers; income has one null; churned is the target.\"}\n```",
        )
        .with_reply(
            WorkflowStage::StatisticsGeneration,
            r#"{"output_format": ["Mean income by churn status", "Churn rate"]}"#,
        )
        .with_replies(
            WorkflowStage::TabularDataCoding,
            [
                r#"{"output_format": "Churned customers earn 45000 on average, others 61000"}"#,
                r#"{"output_format": "Churn rate is 50%"}"#,
            ],
        )
        .with_reply(
            WorkflowStage::BusinessInsightGeneration,
            r#"{"output_format": [{"name": "Income drives churn", "description": "Lower income customers churn more.", "findings": ["Churned customers earn 26% less"]}]}"#,
        )
        .with_reply(
            WorkflowStage::WebReportGeneration,
            format!(r#"{{"output_format": "{REPORT_HTML}"}}"#),
        )
}

/// Drain a run stream.
pub async fn collect_events(stream: RunStream) -> Vec<RunEvent> {
    stream.collect().await
}
