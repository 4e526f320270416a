//! Deterministic model that replays scripted replies per stage.
//!
//! Used by the test suites and by `--model scripted` demo runs. Replies are
//! consumed in order from a per-stage queue; once a queue is empty the stage's
//! fallback reply (if any) is returned on every further call.

use crate::models::base::LanguageModel;
use crate::models::base::ModelError;
use crate::models::base::ModelEvent;
use crate::models::base::ModelRequest;
use crate::models::base::ModelStream;
use async_trait::async_trait;
use ce_protocol::WorkflowStage;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

type Reply = Result<String, ModelError>;

#[derive(Default)]
struct StageScript {
    queue: VecDeque<Reply>,
    fallback: Option<Reply>,
}

pub struct ScriptedModel {
    name: String,
    available: bool,
    scripts: Mutex<HashMap<WorkflowStage, StageScript>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            name: "scripted".to_string(),
            available: true,
            scripts: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Queues one reply for the stage.
    pub fn with_reply(self, stage: WorkflowStage, reply: impl Into<String>) -> Self {
        self.push(stage, Ok(reply.into()));
        self
    }

    /// Queues several replies for the stage, consumed in order.
    pub fn with_replies<I, S>(self, stage: WorkflowStage, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for reply in replies {
            self.push(stage, Ok(reply.into()));
        }
        self
    }

    /// Queues a transport failure for the stage.
    pub fn with_failure(self, stage: WorkflowStage, error: ModelError) -> Self {
        self.push(stage, Err(error));
        self
    }

    /// Reply returned for the stage once its queue is drained.
    pub fn with_fallback(self, stage: WorkflowStage, reply: impl Into<String>) -> Self {
        self.lock_scripts()
            .entry(stage)
            .or_default()
            .fallback = Some(Ok(reply.into()));
        self
    }

    /// A model that answers every stage with a well-formed canned reply.
    pub fn demo() -> Self {
        let model = Self {
            name: "scripted-demo".to_string(),
            ..Self::new()
        };
        DEMO_REPLIES
            .iter()
            .fold(model, |model, (stage, reply)| model.with_fallback(*stage, *reply))
    }

    /// Total number of invocations so far.
    pub fn call_count(&self) -> usize {
        self.lock_requests().len()
    }

    /// Number of invocations issued by the given stage.
    pub fn calls_for(&self, stage: WorkflowStage) -> usize {
        self.lock_requests()
            .iter()
            .filter(|request| request.stage == stage)
            .count()
    }

    /// Every request received, in call order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock_requests().clone()
    }

    fn push(&self, stage: WorkflowStage, reply: Reply) {
        self.lock_scripts()
            .entry(stage)
            .or_default()
            .queue
            .push_back(reply);
    }

    fn next_reply(&self, stage: WorkflowStage) -> Reply {
        let mut scripts = self.lock_scripts();
        let script = scripts.entry(stage).or_default();
        script
            .queue
            .pop_front()
            .or_else(|| script.fallback.clone())
            .unwrap_or(Err(ModelError::ScriptExhausted(stage)))
    }

    fn lock_scripts(&self) -> std::sync::MutexGuard<'_, HashMap<WorkflowStage, StageScript>> {
        self.scripts.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_requests(&self) -> std::sync::MutexGuard<'_, Vec<ModelRequest>> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check_availability(&self) -> bool {
        self.available
    }

    async fn invoke(
        &self,
        request: &ModelRequest,
        _cancel: &CancellationToken,
    ) -> Result<ModelStream, ModelError> {
        if !self.available {
            return Err(ModelError::NotAvailable(
                "Scripted model not available".to_string(),
            ));
        }

        self.lock_requests().push(request.clone());
        let reply = self.next_reply(request.stage)?;
        let events = vec![Ok(ModelEvent::MessageChunk(reply)), Ok(ModelEvent::Completed)];
        Ok(Box::pin(tokio_stream::iter(events)))
    }
}

const DEMO_REPLIES: &[(WorkflowStage, &str)] = &[
    (
        WorkflowStage::MetadataExtraction,
        r#"{"output_format": ["How many rows and columns does the dataset have?", "What is the data type of each column?", "How many missing values does each column contain?", "What is the distribution of the target column?"]}"#,
    ),
    (
        WorkflowStage::TabularAnalysis,
        r#"{"output_format": "The answer could not be computed offline in demo mode."}"#,
    ),
    (
        WorkflowStage::StructureCreation,
        r#"{"output_format": "Dataset overview: the table holds tabular records with a single target column. Column types, missingness and the target distribution should be profiled before modelling."}"#,
    ),
    (
        WorkflowStage::StatisticsGeneration,
        r#"{"output_format": ["Compute summary statistics for every numeric column", "Count missing values per column", "Compute the value counts of the target column"]}"#,
    ),
    (
        WorkflowStage::TabularDataCoding,
        r#"{"output_format": "Computed in demo mode without executing code."}"#,
    ),
    (
        WorkflowStage::BusinessInsightGeneration,
        r#"{"output_format": [{"name": "Data completeness", "description": "Missing values are concentrated in a few columns.", "findings": ["Most columns are fully populated"], "charts": [{"title": "Missing values per column", "kind": "bar", "description": "Null count for each column"}]}]}"#,
    ),
    (
        WorkflowStage::WebReportGeneration,
        r#"{"output_format": "<!DOCTYPE html><html><head><title>EDA Report</title></head><body><h1>Exploratory Data Analysis</h1><h2>Data completeness</h2><p>Missing values are concentrated in a few columns.</p></body></html>"}"#,
    ),
];
