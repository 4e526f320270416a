//! Per-item questions answered against the decoded table.

use crate::executors::output::parse_answer;
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
use crate::registry::stage_spec;
use crate::registry::ExecutorKind;
use async_trait::async_trait;
use ce_protocol::AgentState;
use ce_protocol::StageOutput;
use std::sync::Arc;
use tracing::debug;

pub struct TabularExecutor {
    model: Arc<dyn LanguageModel>,
}

impl TabularExecutor {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    async fn answer_all(
        &self,
        state: &AgentState,
        ctx: &StageContext<'_>,
    ) -> Result<StageOutput, ExecutorError> {
        let spec = stage_spec(ctx.stage);
        let system_prompt = ctx.prompts.system_prompt(ctx.stage, state)?;
        let mut answers = Vec::with_capacity(state.pending_work.len());

        for (index, item) in state.pending_work.iter().enumerate() {
            if index > 0 {
                pause(ctx.sleep(), ctx.cancel).await?;
            }

            let request = ModelRequest::new(ctx.stage, format!("{item}\n\n{UNANSWERABLE_NOTE}"))
                .with_system_prompt(system_prompt.as_str())
                .with_temperature(ctx.config.temperature)
                .with_response_schema(spec.shape.response_schema());
            let answer = attempt_until_parsed(
                self.model.as_ref(),
                &request,
                ctx.config.retry_limit,
                ctx.sleep(),
                ctx.cancel,
                parse_answer,
            )
            .await?;

            if answer == NO_ANSWER {
                debug!(stage = %ctx.stage, item = index, "no answer, dropping item");
            } else {
                answers.push(answer);
            }
        }

        Ok(StageOutput::Items(answers))
    }
}

#[async_trait]
impl StageExecutor for TabularExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::TabularData
    }

    async fn execute(
        &self,
        state: &AgentState,
        ctx: &StageContext<'_>,
    ) -> Result<AgentState, StageFailure> {
        let outcome = self.answer_all(state, ctx).await;
        ctx.finish(state, outcome)
    }
}
