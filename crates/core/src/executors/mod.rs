//! Stage executors.
//!
//! An executor turns the current [`AgentState`] into the next one for a
//! single stage. Three kinds exist, selected through the dispatch table:
//!
//! - [`ReasoningExecutor`]: one model call over all pending work
//! - [`TabularExecutor`]: one call per item, answered against the table
//! - [`CodeExecutor`]: one tool loop per item, computed in the sandbox
//!
//! Every executor finishes through [`StageContext::finish`], so history,
//! accumulators and stage advancement follow the same rules everywhere.

pub mod code;
pub mod output;
pub mod prompts;
pub mod reasoning;
pub mod retry;
pub mod tabular;

use crate::dataset::TableError;
use crate::models::LanguageModel;
use crate::models::ModelError;
use crate::registry::ExecutorKind;
use crate::registry::StageRegistry;
use crate::sandbox::CodeSandbox;
use crate::sandbox::SandboxError;
use crate::state::transition::complete_stage;
use crate::state::transition::record_failure;
use async_trait::async_trait;
use ce_protocol::AgentState;
use ce_protocol::RunConfiguration;
use ce_protocol::StageOutput;
use ce_protocol::WorkflowStage;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use code::CodeExecutor;
pub use output::OutputShape;
pub use output::ParseError;
pub use prompts::PromptBook;
pub use reasoning::ReasoningExecutor;
pub use retry::attempt_until_parsed;
pub use tabular::TabularExecutor;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("No parseable reply for stage {stage} after {attempts} attempts: {last_error}")]
    RetryExhausted {
        stage: WorkflowStage,
        attempts: u32,
        last_error: String,
    },

    #[error("Model call failed")]
    Model(#[from] ModelError),

    #[error("Dataset could not be decoded")]
    Dataset(#[from] TableError),

    #[error("Code execution failed")]
    Sandbox(#[from] SandboxError),

    #[error("Stage {stage} used all {limit} code rounds without giving an answer")]
    ToolBudgetExhausted { stage: WorkflowStage, limit: u32 },

    #[error("Stage cancelled")]
    Cancelled,
}

impl ExecutorError {
    /// True when the run was cancelled, whichever layer noticed it first.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ExecutorError::Cancelled
                | ExecutorError::Model(ModelError::Cancelled)
                | ExecutorError::Sandbox(SandboxError::Cancelled)
        )
    }
}

/// A stage that did not complete.
///
/// `state` already carries the error record for the stage.
#[derive(Error, Debug)]
#[error("Stage {stage} failed")]
pub struct StageFailure {
    pub stage: WorkflowStage,
    pub state: Box<AgentState>,
    #[source]
    pub error: ExecutorError,
}

/// Everything an executor needs besides the state.
pub struct StageContext<'a> {
    /// Stage being executed.
    pub stage: WorkflowStage,
    pub config: &'a RunConfiguration,
    pub registry: &'a StageRegistry,
    pub prompts: &'a PromptBook,
    pub cancel: &'a CancellationToken,
}

impl StageContext<'_> {
    /// Spacing between retries and between work items.
    pub fn sleep(&self) -> Duration {
        Duration::from_secs(self.config.sleep_seconds)
    }

    /// Applies the stage outcome to the state.
    pub fn finish(
        &self,
        state: &AgentState,
        outcome: Result<StageOutput, ExecutorError>,
    ) -> Result<AgentState, StageFailure> {
        match outcome {
            Ok(output) => Ok(complete_stage(
                state,
                self.stage,
                output,
                &self.config.run_id,
                self.registry,
            )),
            Err(error) => Err(StageFailure {
                stage: self.stage,
                state: Box::new(record_failure(
                    state,
                    self.stage,
                    &error.to_string(),
                    &self.config.run_id,
                )),
                error,
            }),
        }
    }
}

#[async_trait]
pub trait StageExecutor: Send + Sync {
    fn kind(&self) -> ExecutorKind;

    async fn execute(
        &self,
        state: &AgentState,
        ctx: &StageContext<'_>,
    ) -> Result<AgentState, StageFailure>;
}

/// One executor of each kind, sharing the injected model.
pub struct ExecutorSet {
    reasoning: ReasoningExecutor,
    tabular: TabularExecutor,
    code: CodeExecutor,
}

impl ExecutorSet {
    pub fn new(model: Arc<dyn LanguageModel>, sandbox: Arc<dyn CodeSandbox>) -> Self {
        Self {
            reasoning: ReasoningExecutor::new(Arc::clone(&model)),
            tabular: TabularExecutor::new(Arc::clone(&model)),
            code: CodeExecutor::new(model, sandbox),
        }
    }

    pub fn for_kind(&self, kind: ExecutorKind) -> &dyn StageExecutor {
        match kind {
            ExecutorKind::Reasoning => &self.reasoning,
            ExecutorKind::TabularData => &self.tabular,
            ExecutorKind::CodeExecution => &self.code,
        }
    }
}
