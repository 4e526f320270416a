//! Run orchestration.
//!
//! The [`Orchestrator`] drives one run through the stage registry. It owns
//! the injected model (through its executors), the ledger and the prompt
//! book, and exposes each run as a lazy stream of [`RunEvent`]s. Nothing
//! happens until the stream is polled, and dropping it stops the run.

use crate::config::validate_run_configuration;
use crate::executors::ExecutorSet;
use crate::executors::PromptBook;
use crate::executors::StageContext;
use crate::ledger::RunLedger;
use crate::ledger::REPORT_ARTIFACT;
use crate::models::LanguageModel;
use crate::registry::stage_spec;
use crate::registry::StageRegistry;
use crate::sandbox::CodeSandbox;
use anyhow::anyhow;
use anyhow::Context;
use async_stream::stream;
use ce_protocol::AgentState;
use ce_protocol::HistoryRecord;
use ce_protocol::RunConfiguration;
use ce_protocol::RunEvent;
use ce_protocol::StageSnapshot;
use ce_protocol::WorkflowStage;
use chrono::Utc;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

/// Events of one run, ending with exactly one terminal event.
pub type RunStream = Pin<Box<dyn Stream<Item = RunEvent> + Send>>;

pub struct Orchestrator {
    executors: Arc<ExecutorSet>,
    ledger: Arc<dyn RunLedger>,
    registry: Arc<StageRegistry>,
    prompts: Arc<PromptBook>,
}

impl Orchestrator {
    /// Creates an orchestrator over the standard registry and built-in prompts.
    ///
    /// # Arguments
    ///
    /// * `model` - Shared by every stage of every run
    /// * `sandbox` - Executes snippets for code-execution stages
    /// * `ledger` - Receives stage snapshots, error traces and the report
    pub fn new(
        model: Arc<dyn LanguageModel>,
        sandbox: Arc<dyn CodeSandbox>,
        ledger: Arc<dyn RunLedger>,
    ) -> Self {
        Self {
            executors: Arc::new(ExecutorSet::new(model, sandbox)),
            ledger,
            registry: Arc::new(StageRegistry::standard()),
            prompts: Arc::new(PromptBook::builtin()),
        }
    }

    pub fn with_registry(mut self, registry: StageRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_prompts(mut self, prompts: PromptBook) -> Self {
        self.prompts = Arc::new(prompts);
        self
    }

    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    pub fn run(&self, state: AgentState, config: RunConfiguration) -> RunStream {
        self.run_with_cancellation(state, config, CancellationToken::new())
    }

    /// Runs from `state.stage` to the end of the registry.
    ///
    /// Yields `ConfigNotSaved` alone when the run was never provisioned.
    /// A state whose stage is missing from the registry fails up front, so
    /// `RunCompleted` always follows the terminal stage. Otherwise yields one `StageCompleted` per stage, then `RunCompleted`,
    /// or stops at the first failure with a single `RunFailed`. The failure
    /// trace goes to the ledger, never into the event.
    pub fn run_with_cancellation(
        &self,
        state: AgentState,
        config: RunConfiguration,
        cancel: CancellationToken,
    ) -> RunStream {
        let executors = Arc::clone(&self.executors);
        let ledger = Arc::clone(&self.ledger);
        let registry = Arc::clone(&self.registry);
        let prompts = Arc::clone(&self.prompts);

        Box::pin(stream! {
            let run_id = config.run_id.clone();
            if !ledger.is_provisioned(&run_id) {
                warn!(run_id = %run_id, "run has no saved configuration");
                yield RunEvent::ConfigNotSaved { run_id };
                return;
            }
            if let Err(e) = validate_run_configuration(&config) {
                abort(ledger.as_ref(), &run_id, None, anyhow::Error::new(e));
                yield RunEvent::RunFailed { run_id, stage: None };
                return;
            }
            match state.stage {
                Some(stage) if registry.contains(stage) => {}
                stage => {
                    let reason = match stage {
                        Some(stage) => anyhow!("stage {stage} is not part of the registry"),
                        None => anyhow!("state has no stage left to run"),
                    };
                    abort(ledger.as_ref(), &run_id, stage, reason);
                    yield RunEvent::RunFailed { run_id, stage };
                    return;
                }
            }

            let started = Instant::now();
            let mut state = state;
            let mut completed = 0usize;
            info!(run_id = %run_id, stages = registry.len(), "run started");

            while let Some(stage) = state.stage {
                if cancel.is_cancelled() {
                    abort(ledger.as_ref(), &run_id, Some(stage), anyhow!("run cancelled before stage {stage}"));
                    yield RunEvent::RunFailed { run_id, stage: Some(stage) };
                    return;
                }

                let spec = stage_spec(stage);
                let ctx = StageContext {
                    stage,
                    config: &config,
                    registry: &registry,
                    prompts: &prompts,
                    cancel: &cancel,
                };
                debug!(run_id = %run_id, stage = %stage, node = spec.node_name, "stage started");
                let stage_started = Instant::now();
                let result = executors.for_kind(spec.executor).execute(&state, &ctx).await;
                let elapsed_ms = elapsed_millis(stage_started);

                let next = match result {
                    Ok(next) => next,
                    Err(failure) => {
                        if let Err(e) = persist_stage(ledger.as_ref(), &run_id, stage, elapsed_ms, &failure.state, false) {
                            warn!(run_id = %run_id, error = %e, "failed to record failed stage");
                        }
                        abort(ledger.as_ref(), &run_id, Some(stage), anyhow::Error::new(failure));
                        yield RunEvent::RunFailed { run_id, stage: Some(stage) };
                        return;
                    }
                };

                let is_terminal = stage == registry.terminal();
                let record = match persist_stage(ledger.as_ref(), &run_id, stage, elapsed_ms, &next, is_terminal) {
                    Ok(record) => record,
                    Err(e) => {
                        abort(ledger.as_ref(), &run_id, Some(stage), e);
                        yield RunEvent::RunFailed { run_id, stage: Some(stage) };
                        return;
                    }
                };

                info!(run_id = %run_id, stage = %stage, elapsed_ms, "stage completed");
                completed += 1;
                state = next;
                yield RunEvent::StageCompleted {
                    run_id: run_id.clone(),
                    stage,
                    node_name: spec.node_name.to_string(),
                    elapsed_ms,
                    record,
                };
            }

            let total_elapsed_ms = elapsed_millis(started);
            info!(run_id = %run_id, stages = completed, total_elapsed_ms, "run completed");
            yield RunEvent::RunCompleted {
                run_id,
                stages_completed: completed,
                total_elapsed_ms,
            };
        })
    }
}

/// Writes the stage snapshot, plus the report when `is_terminal`.
///
/// Returns the history record the stage appended.
fn persist_stage(
    ledger: &dyn RunLedger,
    run_id: &str,
    stage: WorkflowStage,
    elapsed_ms: u64,
    state: &AgentState,
    is_terminal: bool,
) -> anyhow::Result<HistoryRecord> {
    let record = state
        .history
        .last()
        .cloned()
        .ok_or_else(|| anyhow!("stage {stage} left no history record"))?;
    let snapshot = StageSnapshot {
        run_id: run_id.to_string(),
        stage,
        node_name: stage_spec(stage).node_name.to_string(),
        recorded_at: Utc::now(),
        elapsed_ms,
        record: record.clone(),
        metadata: state.metadata.clone(),
        statistics: state.statistics.clone(),
        insights: state.insights.clone(),
        next_stage: state.stage,
    };
    let payload = serde_json::to_string_pretty(&snapshot)?;
    ledger
        .append(run_id, stage.as_str(), snapshot.recorded_at, &payload)
        .with_context(|| format!("failed to record stage {stage}"))?;

    if is_terminal {
        let html = state
            .stage_output
            .as_ref()
            .and_then(|output| output.as_html())
            .ok_or_else(|| anyhow!("terminal stage {stage} produced no HTML report"))?;
        ledger
            .write_artifact(run_id, REPORT_ARTIFACT, html.as_bytes())
            .context("failed to write the report")?;
    }

    Ok(record)
}

/// Writes the error chain to the ledger and logs it.
fn abort(ledger: &dyn RunLedger, run_id: &str, stage: Option<WorkflowStage>, error: anyhow::Error) {
    let trace = format!("{error:?}");
    if let Err(e) = ledger.append_error(run_id, Utc::now(), &trace) {
        warn!(run_id = %run_id, error = %e, "failed to write error trace");
    }
    error!(run_id = %run_id, stage = ?stage, error = %format!("{error:#}"), "run failed");
}

fn elapsed_millis(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::FileLedger;
    use crate::models::ScriptedModel;
    use crate::sandbox::DisabledSandbox;
    use ce_protocol::ProblemType;
    use ce_protocol::RunSettings;
    use tempfile::tempdir;
    use tokio_stream::StreamExt;

    fn orchestrator(ledger: Arc<FileLedger>, model: ScriptedModel) -> Orchestrator {
        Orchestrator::new(Arc::new(model), Arc::new(DisabledSandbox), ledger)
    }

    #[tokio::test]
    async fn test_unprovisioned_run_yields_only_config_not_saved() {
        let dir = tempdir().expect("tempdir");
        let ledger = Arc::new(FileLedger::new(dir.path()));
        let model = ScriptedModel::demo();
        let orchestrator = orchestrator(ledger, model);

        let state = AgentState::new("task", "[]", WorkflowStage::MetadataExtraction);
        let events: Vec<RunEvent> = orchestrator
            .run(state, RunConfiguration::new("never-provisioned"))
            .collect()
            .await;

        assert_eq!(
            events,
            vec![RunEvent::ConfigNotSaved {
                run_id: "never-provisioned".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_cancelled_run_fails_before_first_stage() {
        let dir = tempdir().expect("tempdir");
        let ledger = Arc::new(FileLedger::new(dir.path()));
        let settings = RunSettings::new("y", ProblemType::Regression, "data.json");
        let run_id = ledger.provision(&settings, "[{\"y\": 1}]").expect("provision");
        let orchestrator = orchestrator(Arc::clone(&ledger), ScriptedModel::demo());

        let cancel = CancellationToken::new();
        cancel.cancel();
        let state = AgentState::new("task", "[{\"y\": 1}]", WorkflowStage::MetadataExtraction);
        let events: Vec<RunEvent> = orchestrator
            .run_with_cancellation(state, settings.run_configuration(), cancel)
            .collect()
            .await;

        assert_eq!(
            events,
            vec![RunEvent::RunFailed {
                run_id: run_id.clone(),
                stage: Some(WorkflowStage::MetadataExtraction)
            }]
        );
        let runs = ledger.list_runs().expect("runs");
        assert!(runs[0].has_errors());
    }

    #[tokio::test]
    async fn test_invalid_configuration_fails_without_stage() {
        let dir = tempdir().expect("tempdir");
        let ledger = Arc::new(FileLedger::new(dir.path()));
        let settings = RunSettings::new("y", ProblemType::Regression, "data.json");
        let run_id = ledger.provision(&settings, "[]").expect("provision");
        let orchestrator = orchestrator(Arc::clone(&ledger), ScriptedModel::demo());

        let mut config = settings.run_configuration();
        config.temperature = 2.0;
        let state = AgentState::new("task", "[]", WorkflowStage::MetadataExtraction);
        let events: Vec<RunEvent> = orchestrator.run(state, config).collect().await;

        assert_eq!(events, vec![RunEvent::RunFailed { run_id, stage: None }]);
    }

    #[tokio::test]
    async fn test_stage_outside_registry_fails_without_running() {
        let dir = tempdir().expect("tempdir");
        let ledger = Arc::new(FileLedger::new(dir.path()));
        let settings = RunSettings::new("y", ProblemType::Regression, "data.json");
        let run_id = ledger.provision(&settings, "[{\"y\": 1}]").expect("provision");
        let orchestrator = orchestrator(Arc::clone(&ledger), ScriptedModel::demo());

        let state = AgentState::new("task", "[{\"y\": 1}]", WorkflowStage::TabularAnalysis);
        let events: Vec<RunEvent> = orchestrator
            .run(state, settings.run_configuration())
            .collect()
            .await;

        assert_eq!(
            events,
            vec![RunEvent::RunFailed {
                run_id: run_id.clone(),
                stage: Some(WorkflowStage::TabularAnalysis)
            }]
        );
        let runs = ledger.list_runs().expect("runs");
        assert!(!runs[0].success);
        assert!(runs[0].has_errors());
        assert_eq!(runs[0].stage_logs().count(), 0);
    }

    #[tokio::test]
    async fn test_finished_state_fails_instead_of_completing() {
        let dir = tempdir().expect("tempdir");
        let ledger = Arc::new(FileLedger::new(dir.path()));
        let settings = RunSettings::new("y", ProblemType::Regression, "data.json");
        let run_id = ledger.provision(&settings, "[]").expect("provision");
        let orchestrator = orchestrator(Arc::clone(&ledger), ScriptedModel::demo());

        let mut state = AgentState::new("task", "[]", WorkflowStage::MetadataExtraction);
        state.stage = None;
        let events: Vec<RunEvent> = orchestrator
            .run(state, settings.run_configuration())
            .collect()
            .await;

        assert_eq!(events, vec![RunEvent::RunFailed { run_id, stage: None }]);
    }

    #[test]
    fn test_node_names_never_collide_with_sentinels() {
        for stage in WorkflowStage::ALL {
            let name = stage_spec(stage).node_name;
            assert_ne!(name, ce_protocol::ipc::CONFIG_NOT_SAVED);
            assert_ne!(name, ce_protocol::ipc::ERROR);
            assert_ne!(name, ce_protocol::ipc::COMPLETED);
        }
    }
}
