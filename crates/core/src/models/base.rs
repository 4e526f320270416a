//! Language model capability and supporting types.

use async_trait::async_trait;
use ce_protocol::WorkflowStage;
use serde_json::Value;
use std::pin::Pin;
use thiserror::Error;
use tokio_stream::Stream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

/// One request to a language model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    /// Stage issuing the request. Providers may ignore it.
    pub stage: WorkflowStage,
    pub system_prompt: String,
    pub instruction: String,
    pub temperature: f32,
    /// JSON schema the reply should satisfy, when the provider supports it.
    pub response_schema: Option<Value>,
}

impl ModelRequest {
    pub fn new(stage: WorkflowStage, instruction: impl Into<String>) -> Self {
        Self {
            stage,
            system_prompt: String::new(),
            instruction: instruction.into(),
            temperature: ce_protocol::DEFAULT_TEMPERATURE,
            response_schema: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_response_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    Thought(String),
    MessageChunk(String),
    Completed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Model not available: {0}")]
    NotAvailable(String),
    #[error("API call failed: {0}")]
    ApiError(String),
    #[error("Rate limited by provider: {0}")]
    RateLimited(String),
    #[error("Response parsing error: {0}")]
    ResponseParseError(String),
    #[error("No scripted reply left for stage {0}")]
    ScriptExhausted(WorkflowStage),
    #[error("Model call cancelled")]
    Cancelled,
}

pub type ModelStream = Pin<Box<dyn Stream<Item = Result<ModelEvent, ModelError>> + Send>>;

/// A text-generating model shared by every stage of a run.
///
/// Constructed once and passed into the orchestrator; implementations must be
/// safe to call from successive stages.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider-specific model name.
    fn name(&self) -> &str;

    async fn check_availability(&self) -> bool;

    /// Starts a call. The token lets the caller abort an in-flight request.
    async fn invoke(
        &self,
        request: &ModelRequest,
        cancel: &CancellationToken,
    ) -> Result<ModelStream, ModelError>;
}

/// Invokes the model and concatenates the message chunks of its reply.
///
/// Thoughts are discarded. Collection stops at `Completed` or at the end of
/// the stream, whichever comes first.
pub async fn collect_reply(
    model: &dyn LanguageModel,
    request: &ModelRequest,
    cancel: &CancellationToken,
) -> Result<String, ModelError> {
    let mut stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ModelError::Cancelled),
        stream = model.invoke(request, cancel) => stream?,
    };

    let mut reply = String::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ModelError::Cancelled),
            next = stream.next() => next,
        };
        match next {
            Some(Ok(ModelEvent::MessageChunk(chunk))) => reply.push_str(&chunk),
            Some(Ok(ModelEvent::Thought(_))) => {}
            Some(Ok(ModelEvent::Completed)) | None => break,
            Some(Err(e)) => return Err(e),
        }
    }
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoModel {
        available: bool,
    }

    #[async_trait]
    impl LanguageModel for EchoModel {
        fn name(&self) -> &str {
            "echo"
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
                return Err(ModelError::NotAvailable("echo is offline".to_string()));
            }
            let stream = tokio_stream::iter(vec![
                Ok(ModelEvent::Thought("thinking".to_string())),
                Ok(ModelEvent::MessageChunk("echo: ".to_string())),
                Ok(ModelEvent::MessageChunk(request.instruction.clone())),
                Ok(ModelEvent::Completed),
                Ok(ModelEvent::MessageChunk("ignored".to_string())),
            ]);
            Ok(Box::pin(stream))
        }
    }

    #[tokio::test]
    async fn test_collect_reply_joins_chunks_until_completed() {
        let model = EchoModel { available: true };
        let request = ModelRequest::new(WorkflowStage::MetadataExtraction, "hello");

        let reply = collect_reply(&model, &request, &CancellationToken::new())
            .await
            .expect("reply");
        assert_eq!(reply, "echo: hello");
    }

    #[tokio::test]
    async fn test_collect_reply_propagates_invoke_error() {
        let model = EchoModel { available: false };
        let request = ModelRequest::new(WorkflowStage::MetadataExtraction, "hello");

        let result = collect_reply(&model, &request, &CancellationToken::new()).await;
        assert!(matches!(result, Err(ModelError::NotAvailable(_))));
    }

    #[tokio::test]
    async fn test_collect_reply_honours_cancelled_token() {
        let model = EchoModel { available: true };
        let request = ModelRequest::new(WorkflowStage::MetadataExtraction, "hello");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = collect_reply(&model, &request, &cancel).await;
        assert_eq!(result, Err(ModelError::Cancelled));
    }

    #[test]
    fn test_request_builder() {
        let request = ModelRequest::new(WorkflowStage::StructureCreation, "task")
            .with_system_prompt("You are a data analyst.")
            .with_temperature(0.3);
        assert_eq!(request.system_prompt, "You are a data analyst.");
        assert_eq!(request.temperature, 0.3);
        assert!(request.response_schema.is_none());
    }
}
