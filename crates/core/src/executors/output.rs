//! Structured output shapes and reply parsing.
//!
//! Every stage asks the model for a JSON object whose `output_format` field
//! has the stage's shape. A reply that does not satisfy the shape is a
//! [`ParseError`], which the retry protocol treats as transient.

use ce_protocol::Insight;
use ce_protocol::StageOutput;
use serde_json::json;
use serde_json::Value;
use thiserror::Error;

/// Key holding the payload in every structured reply.
pub const OUTPUT_FIELD: &str = "output_format";
/// Key holding a snippet in a code execution request.
pub const CODE_FIELD: &str = "code";
/// Answer meaning "this question could not be answered".
pub const NO_ANSWER: &str = "None";
/// Appended to each per-item question so the model can answer [`NO_ANSWER`].
pub const UNANSWERABLE_NOTE: &str = "If you are unable to answer, return `None`.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputShape {
    /// A list of strings.
    TextList,
    /// One document string.
    Document,
    /// A list of insight records.
    InsightList,
    /// One complete HTML page.
    Html,
    /// One answer string for a single work item.
    Answer,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("reply contains no JSON object")]
    NoJson,

    #[error("reply is missing the '{0}' field")]
    MissingField(&'static str),

    #[error("'{field}' has the wrong shape: expected {expected}")]
    WrongShape {
        field: &'static str,
        expected: &'static str,
    },

    #[error("'output_format' is not a valid insight list: {0}")]
    InvalidInsight(String),

    #[error("'output_format' does not contain an HTML document")]
    NotHtml,

    #[error("reply sets both 'code' and 'output_format'")]
    AmbiguousStep,
}

/// One reply of the code execution loop.
#[derive(Debug, Clone, PartialEq)]
pub enum CodeStep {
    /// Run this snippet and report back.
    Run(String),
    /// The final answer for the work item.
    Answer(String),
}

impl OutputShape {
    fn expected(&self) -> &'static str {
        match self {
            OutputShape::TextList => "a list of strings",
            OutputShape::Document => "a string",
            OutputShape::InsightList => "a list of insight objects",
            OutputShape::Html => "an HTML string",
            OutputShape::Answer => "a string",
        }
    }

    /// JSON schema for the `output_format` value.
    fn value_schema(&self) -> Value {
        match self {
            OutputShape::TextList => json!({"type": "array", "items": {"type": "string"}}),
            OutputShape::Document | OutputShape::Html | OutputShape::Answer => {
                json!({"type": "string"})
            }
            OutputShape::InsightList => json!({
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": {"type": "string"},
                        "description": {"type": "string"},
                        "findings": {"type": "array", "items": {"type": "string"}},
                        "charts": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "title": {"type": "string"},
                                    "kind": {"type": "string"},
                                    "description": {"type": "string"}
                                },
                                "required": ["title", "kind"]
                            }
                        }
                    },
                    "required": ["name", "description"]
                }
            }),
        }
    }

    /// Schema of the whole reply object.
    pub fn response_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { OUTPUT_FIELD: self.value_schema() },
            "required": [OUTPUT_FIELD]
        })
    }

    /// Prompt text describing the expected reply.
    pub fn format_instructions(&self) -> String {
        let example = match self {
            OutputShape::TextList => r#"{"output_format": ["first item", "second item"]}"#,
            OutputShape::Document => r#"{"output_format": "the complete document"}"#,
            OutputShape::InsightList => {
                r#"{"output_format": [{"name": "...", "description": "...", "findings": ["..."], "charts": [{"title": "...", "kind": "bar", "description": "..."}]}]}"#
            }
            OutputShape::Html => r#"{"output_format": "<!DOCTYPE html><html>...</html>"}"#,
            OutputShape::Answer => r#"{"output_format": "the answer"}"#,
        };
        format!(
            "Respond with a single JSON object and nothing else. The \"{OUTPUT_FIELD}\" field must be {}.\nExample: {example}",
            self.expected()
        )
    }

    /// Parses a raw model reply into this shape.
    pub fn parse(&self, raw: &str) -> Result<StageOutput, ParseError> {
        let reply = extract_json(raw)?;
        let value = reply
            .get(OUTPUT_FIELD)
            .ok_or(ParseError::MissingField(OUTPUT_FIELD))?;
        self.parse_value(value)
    }

    fn parse_value(&self, value: &Value) -> Result<StageOutput, ParseError> {
        let wrong_shape = || ParseError::WrongShape {
            field: OUTPUT_FIELD,
            expected: self.expected(),
        };
        match self {
            OutputShape::TextList => {
                let items = value.as_array().ok_or_else(wrong_shape)?;
                items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string).ok_or_else(wrong_shape))
                    .collect::<Result<Vec<_>, _>>()
                    .map(StageOutput::Items)
            }
            OutputShape::Document => value
                .as_str()
                .map(|text| StageOutput::Document(text.to_string()))
                .ok_or_else(wrong_shape),
            OutputShape::Answer => value
                .as_str()
                .map(|text| StageOutput::Items(vec![text.trim().to_string()]))
                .ok_or_else(wrong_shape),
            OutputShape::InsightList => {
                if !value.is_array() {
                    return Err(wrong_shape());
                }
                serde_json::from_value::<Vec<Insight>>(value.clone())
                    .map(StageOutput::Insights)
                    .map_err(|e| ParseError::InvalidInsight(e.to_string()))
            }
            OutputShape::Html => {
                let html = value.as_str().ok_or_else(wrong_shape)?;
                if !looks_like_html(html) {
                    return Err(ParseError::NotHtml);
                }
                Ok(StageOutput::Html(html.trim().to_string()))
            }
        }
    }
}

/// Parses a reply of the code execution loop.
pub fn parse_code_step(raw: &str) -> Result<CodeStep, ParseError> {
    let reply = extract_json(raw)?;
    match (reply.get(CODE_FIELD), reply.get(OUTPUT_FIELD)) {
        (Some(_), Some(_)) => Err(ParseError::AmbiguousStep),
        (Some(code), None) => code
            .as_str()
            .filter(|code| !code.trim().is_empty())
            .map(|code| CodeStep::Run(code.to_string()))
            .ok_or(ParseError::WrongShape {
                field: CODE_FIELD,
                expected: "a non-empty string",
            }),
        (None, Some(answer)) => answer_text(answer).map(CodeStep::Answer),
        (None, None) => Err(ParseError::MissingField(OUTPUT_FIELD)),
    }
}

/// Parses a single-answer reply into its trimmed text.
pub fn parse_answer(raw: &str) -> Result<String, ParseError> {
    let reply = extract_json(raw)?;
    let value = reply
        .get(OUTPUT_FIELD)
        .ok_or(ParseError::MissingField(OUTPUT_FIELD))?;
    answer_text(value)
}

fn answer_text(value: &Value) -> Result<String, ParseError> {
    value
        .as_str()
        .map(|text| text.trim().to_string())
        .ok_or(ParseError::WrongShape {
            field: OUTPUT_FIELD,
            expected: "a string",
        })
}

/// Finds the JSON object in a reply.
///
/// Accepts a bare object, an object inside a fenced code block, or an object
/// surrounded by prose.
pub fn extract_json(raw: &str) -> Result<Value, ParseError> {
    let trimmed = raw.trim();
    let candidates = [Some(trimmed), fenced_block(trimmed), outer_braces(trimmed)];
    candidates
        .into_iter()
        .flatten()
        .find_map(|candidate| {
            serde_json::from_str::<Value>(candidate)
                .ok()
                .filter(Value::is_object)
        })
        .ok_or(ParseError::NoJson)
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn outer_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn looks_like_html(text: &str) -> bool {
    let lower = text.trim_start().to_ascii_lowercase();
    lower.starts_with("<!doctype html") || lower.starts_with("<html") || lower.contains("<body")
}
