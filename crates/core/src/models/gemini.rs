//! Gemini `generateContent` provider.

use crate::models::base::LanguageModel;
use crate::models::base::ModelError;
use crate::models::base::ModelEvent;
use crate::models::base::ModelRequest;
use crate::models::base::ModelStream;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::json;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Gemini API base URL.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variables checked for an API key, in order.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

pub struct GeminiModel {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiModel {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(300))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    /// Reads the API key from `key_var` or, when unset, from the default variables.
    pub fn from_env(model: impl Into<String>, key_var: Option<&str>) -> Result<Self, ModelError> {
        let candidates: Vec<&str> = match key_var {
            Some(var) => vec![var],
            None => API_KEY_VARS.to_vec(),
        };
        let api_key = candidates
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|key| !key.is_empty()))
            .ok_or_else(|| {
                ModelError::NotAvailable(format!(
                    "no API key found, set one of: {}",
                    candidates.join(", ")
                ))
            })?;
        Ok(Self::new(model, api_key))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            self.model,
            self.api_key
        )
    }
}

/// Builds the `generateContent` request body.
pub fn build_request_body(request: &ModelRequest) -> Value {
    let mut body = json!({
        "contents": [{
            "role": "user",
            "parts": [{"text": request.instruction}]
        }],
        "generationConfig": {
            "temperature": request.temperature,
            "responseMimeType": "application/json"
        }
    });
    if let Some(schema) = &request.response_schema {
        body["generationConfig"]["responseJsonSchema"] = schema.clone();
    }
    if !request.system_prompt.is_empty() {
        body["systemInstruction"] = json!({
            "parts": [{"text": request.system_prompt}]
        });
    }
    body
}

/// Extracts the text parts of the first candidate.
///
/// Parts flagged `thought` are returned separately from the answer text.
pub fn parse_response(body: &Value) -> Result<(Vec<String>, String), ModelError> {
    if let Some(error) = body.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(ModelError::ApiError(message.to_string()));
    }

    let parts = body
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            let reason = body
                .pointer("/promptFeedback/blockReason")
                .and_then(Value::as_str)
                .unwrap_or("response has no candidate content");
            ModelError::ResponseParseError(reason.to_string())
        })?;

    let mut thoughts = Vec::new();
    let mut text = String::new();
    for part in parts {
        let Some(chunk) = part.get("text").and_then(Value::as_str) else {
            continue;
        };
        if part.get("thought").and_then(Value::as_bool).unwrap_or(false) {
            thoughts.push(chunk.to_string());
        } else {
            text.push_str(chunk);
        }
    }
    Ok((thoughts, text))
}

#[async_trait]
impl LanguageModel for GeminiModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn check_availability(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn invoke(
        &self,
        request: &ModelRequest,
        cancel: &CancellationToken,
    ) -> Result<ModelStream, ModelError> {
        let body = build_request_body(request);
        debug!(model = %self.model, stage = %request.stage, "sending generateContent request");

        let send = self.client.post(self.endpoint()).json(&body).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ModelError::Cancelled),
            response = send => response.map_err(|e| ModelError::ApiError(e.to_string()))?,
        };

        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| ModelError::ResponseParseError(e.to_string()))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ModelError::RateLimited(payload.to_string()));
        }
        if !status.is_success() {
            let message = match parse_response(&payload) {
                Err(e) => e.to_string(),
                Ok(_) => payload.to_string(),
            };
            return Err(ModelError::ApiError(format!("{status}: {message}")));
        }

        let (thoughts, text) = parse_response(&payload)?;
        let stream = async_stream::stream! {
            for thought in thoughts {
                yield Ok(ModelEvent::Thought(thought));
            }
            yield Ok(ModelEvent::MessageChunk(text));
            yield Ok(ModelEvent::Completed);
        };
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ce_protocol::WorkflowStage;

    #[test]
    fn test_request_body_shape() {
        let request = ModelRequest::new(WorkflowStage::StatisticsGeneration, "Propose analyses")
            .with_system_prompt("You are a statistician.")
            .with_temperature(0.5);

        let body = build_request_body(&request);
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Propose analyses");
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You are a statistician."
        );
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn test_request_body_omits_empty_system_prompt() {
        let request = ModelRequest::new(WorkflowStage::MetadataExtraction, "task");
        let body = build_request_body(&request);
        assert!(body.get("systemInstruction").is_none());
        assert!(body["generationConfig"].get("responseJsonSchema").is_none());
    }

    #[test]
    fn test_parse_response_separates_thoughts() {
        let body = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "considering columns", "thought": true},
                        {"text": "{\"output_format\": "},
                        {"text": "[\"a\"]}"}
                    ]
                }
            }]
        });

        let (thoughts, text) = parse_response(&body).expect("parse");
        assert_eq!(thoughts, vec!["considering columns"]);
        assert_eq!(text, r#"{"output_format": ["a"]}"#);
    }

    #[test]
    fn test_parse_response_reports_block_reason() {
        let body = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        assert_eq!(
            parse_response(&body),
            Err(ModelError::ResponseParseError("SAFETY".to_string()))
        );
    }

    #[test]
    fn test_parse_response_reports_api_error() {
        let body = json!({"error": {"code": 400, "message": "API key not valid"}});
        assert_eq!(
            parse_response(&body),
            Err(ModelError::ApiError("API key not valid".to_string()))
        );
    }

    #[test]
    fn test_endpoint_includes_model_and_key() {
        let model = GeminiModel::new("gemini-2.5-flash", "secret")
            .with_base_url("http://localhost:9999/v1beta/");
        assert_eq!(
            model.endpoint(),
            "http://localhost:9999/v1beta/models/gemini-2.5-flash:generateContent?key=secret"
        );
    }
}
