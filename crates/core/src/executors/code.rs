//! Code-execution stages.
//!
//! Each work item runs a small tool loop: the model either asks for a
//! snippet to be executed (`{"code": ...}`) or gives its final answer
//! (`{"output_format": ...}`). Snippet output, including exceptions raised by
//! the snippet, is appended to the transcript for the next call. Answers of
//! `None` are dropped, as in tabular stages.

use crate::dataset::Table;
use crate::executors::output::parse_code_step;
use crate::executors::output::CodeStep;
use crate::executors::output::NO_ANSWER;
use crate::executors::output::UNANSWERABLE_NOTE;
use crate::executors::retry::attempt_until_parsed;
use crate::executors::retry::pause;
use crate::executors::ExecutorError;
use crate::executors::StageContext;
use crate::executors::StageExecutor;
use crate::executors::StageFailure;
use crate::models::LanguageModel;
use crate::models::ModelRequest;
use crate::registry::ExecutorKind;
use crate::sandbox::CodeSandbox;
use async_trait::async_trait;
use ce_protocol::AgentState;
use ce_protocol::StageOutput;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

pub struct CodeExecutor {
    model: Arc<dyn LanguageModel>,
    sandbox: Arc<dyn CodeSandbox>,
}

impl CodeExecutor {
    pub fn new(model: Arc<dyn LanguageModel>, sandbox: Arc<dyn CodeSandbox>) -> Self {
        Self { model, sandbox }
    }

    async fn compute_all(
        &self,
        state: &AgentState,
        ctx: &StageContext<'_>,
    ) -> Result<StageOutput, ExecutorError> {
        let table = Table::from_records_json(&state.df)?;
        let system_prompt = ctx.prompts.system_prompt(ctx.stage, state)?;
        let mut answers = Vec::with_capacity(state.pending_work.len());

        for (index, item) in state.pending_work.iter().enumerate() {
            if index > 0 {
                pause(ctx.sleep(), ctx.cancel).await?;
            }
            let answer = self.solve(item, &table, &system_prompt, ctx).await?;
            if answer == NO_ANSWER {
                debug!(stage = %ctx.stage, item = index, "no answer, dropping item");
            } else {
                answers.push(answer);
            }
        }

        Ok(StageOutput::Items(answers))
    }

    async fn solve(
        &self,
        item: &str,
        table: &Table,
        system_prompt: &str,
        ctx: &StageContext<'_>,
    ) -> Result<String, ExecutorError> {
        let limit = ctx.config.max_tool_rounds;
        let mut transcript = format!("{item}\n\n{UNANSWERABLE_NOTE}");

        for round in 0..=limit {
            let request = ModelRequest::new(ctx.stage, transcript.as_str())
                .with_system_prompt(system_prompt)
                .with_temperature(ctx.config.temperature);
            let step = attempt_until_parsed(
                self.model.as_ref(),
                &request,
                ctx.config.retry_limit,
                ctx.sleep(),
                ctx.cancel,
                parse_code_step,
            )
            .await?;

            let code = match step {
                CodeStep::Answer(answer) => return Ok(answer),
                CodeStep::Run(_) if round == limit => break,
                CodeStep::Run(code) => code,
            };

            let output = self.sandbox.run(&code, table, ctx.cancel).await?;
            debug!(
                stage = %ctx.stage,
                round,
                success = output.is_success(),
                "snippet executed"
            );
            let _ = write!(
                transcript,
                "\n\nYou ran:\n```python\n{}\n```\nResult:\n{}",
                code.trim_end(),
                output.observation()
            );
        }

        Err(ExecutorError::ToolBudgetExhausted {
            stage: ctx.stage,
            limit,
        })
    }
}

#[async_trait]
impl StageExecutor for CodeExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::CodeExecution
    }

    async fn execute(
        &self,
        state: &AgentState,
        ctx: &StageContext<'_>,
    ) -> Result<AgentState, StageFailure> {
        let outcome = self.compute_all(state, ctx).await;
        ctx.finish(state, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::PromptBook;
    use crate::models::ScriptedModel;
    use crate::registry::StageRegistry;
    use crate::sandbox::SandboxError;
    use crate::sandbox::SandboxOutput;
    use ce_protocol::RunConfiguration;
    use ce_protocol::WorkflowStage;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const STAGE: WorkflowStage = WorkflowStage::TabularDataCoding;
    const DF: &str = r#"[{"price": 10}, {"price": 4}]"#;

    /// Echoes each snippet back as its output and records what it ran.
    #[derive(Default)]
    struct EchoSandbox {
        ran: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CodeSandbox for EchoSandbox {
        async fn check_availability(&self) -> bool {
            true
        }

        async fn run(
            &self,
            code: &str,
            _table: &Table,
            _cancel: &CancellationToken,
        ) -> Result<SandboxOutput, SandboxError> {
            self.ran.lock().expect("lock").push(code.to_string());
            Ok(SandboxOutput {
                stdout: format!("ran {code}\n"),
                error: None,
            })
        }
    }

    async fn run(
        model: Arc<ScriptedModel>,
        sandbox: Arc<EchoSandbox>,
        max_tool_rounds: u32,
    ) -> Result<AgentState, StageFailure> {
        run_items(model, sandbox, max_tool_rounds, &["total price", "row count"], 0).await
    }

    async fn run_items(
        model: Arc<ScriptedModel>,
        sandbox: Arc<EchoSandbox>,
        max_tool_rounds: u32,
        items: &[&str],
        sleep_seconds: u64,
    ) -> Result<AgentState, StageFailure> {
        let config = RunConfiguration {
            sleep_seconds,
            max_tool_rounds,
            ..RunConfiguration::new("run-c")
        };
        let registry = StageRegistry::standard();
        let prompts = PromptBook::builtin();
        let cancel = CancellationToken::new();
        let ctx = StageContext {
            stage: STAGE,
            config: &config,
            registry: &registry,
            prompts: &prompts,
            cancel: &cancel,
        };
        let mut state = AgentState::new("unused", DF, STAGE);
        state.pending_work = items.iter().map(|item| item.to_string()).collect();
        CodeExecutor::new(model, sandbox).execute(&state, &ctx).await
    }

    #[tokio::test]
    async fn test_observation_feeds_next_call() {
        let model = Arc::new(ScriptedModel::new().with_replies(
            STAGE,
            [
                r#"{"code": "print(df.price.sum())"}"#,
                r#"{"output_format": "total price is 14"}"#,
                r#"{"output_format": "2 rows"}"#,
            ],
        ));
        let sandbox = Arc::new(EchoSandbox::default());

        let next = run(model.clone(), sandbox.clone(), 3).await.expect("completes");

        assert_eq!(next.pending_work, vec!["total price is 14", "2 rows"]);
        assert_eq!(next.stage, Some(WorkflowStage::BusinessInsightGeneration));
        assert_eq!(*sandbox.ran.lock().expect("lock"), vec!["print(df.price.sum())"]);

        let requests = model.requests();
        assert!(requests[0].instruction.starts_with("total price"));
        assert!(requests[0].instruction.ends_with(UNANSWERABLE_NOTE));
        assert!(requests[1].instruction.contains("ran print(df.price.sum())"));
        assert!(requests[2].instruction.starts_with("row count"));
    }

    #[tokio::test]
    async fn test_round_limit_is_fatal() {
        let model =
            Arc::new(ScriptedModel::new().with_fallback(STAGE, r#"{"code": "print(1)"}"#));
        let sandbox = Arc::new(EchoSandbox::default());

        let failure = run(model.clone(), sandbox.clone(), 2).await.unwrap_err();

        assert!(matches!(
            failure.error,
            ExecutorError::ToolBudgetExhausted { limit: 2, .. }
        ));
        assert_eq!(sandbox.ran.lock().expect("lock").len(), 2);
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_items_spaced_by_sleep_and_none_dropped() {
        let model = Arc::new(ScriptedModel::new().with_replies(
            STAGE,
            [
                r#"{"output_format": "max price 10"}"#,
                r#"{"code": "print(df.colour)"}"#,
                r#"{"output_format": "None"}"#,
                r#"{"output_format": "min price 4"}"#,
            ],
        ));
        let sandbox = Arc::new(EchoSandbox::default());
        let started = tokio::time::Instant::now();

        let next = run_items(
            model.clone(),
            sandbox,
            3,
            &["max price?", "colour?", "min price?"],
            10,
        )
        .await
        .expect("completes");

        assert_eq!(next.pending_work, vec!["max price 10", "min price 4"]);
        assert_eq!(started.elapsed(), Duration::from_secs(20));
        assert_eq!(model.call_count(), 4);
    }
}
