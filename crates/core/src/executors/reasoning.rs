//! Single-call reasoning stages.

use crate::executors::retry::attempt_until_parsed;
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

/// Sends all pending work in one request and parses the stage's shape.
pub struct ReasoningExecutor {
    model: Arc<dyn LanguageModel>,
}

impl ReasoningExecutor {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    async fn produce(
        &self,
        state: &AgentState,
        ctx: &StageContext<'_>,
    ) -> Result<StageOutput, ExecutorError> {
        let spec = stage_spec(ctx.stage);
        let system_prompt = ctx.prompts.system_prompt(ctx.stage, state)?;
        let request = ModelRequest::new(ctx.stage, state.pending_work.join("\n\n"))
            .with_system_prompt(system_prompt)
            .with_temperature(ctx.config.temperature)
            .with_response_schema(spec.shape.response_schema());

        debug!(
            stage = %ctx.stage,
            items = state.pending_work.len(),
            "requesting {}",
            spec.node_name
        );
        attempt_until_parsed(
            self.model.as_ref(),
            &request,
            ctx.config.retry_limit,
            ctx.sleep(),
            ctx.cancel,
            |raw| spec.shape.parse(raw),
        )
        .await
    }
}

#[async_trait]
impl StageExecutor for ReasoningExecutor {
    fn kind(&self) -> ExecutorKind {
        ExecutorKind::Reasoning
    }

    async fn execute(
        &self,
        state: &AgentState,
        ctx: &StageContext<'_>,
    ) -> Result<AgentState, StageFailure> {
        let outcome = self.produce(state, ctx).await;
        ctx.finish(state, outcome)
    }
}
