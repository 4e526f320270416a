//! System prompt assembly.
//!
//! A stage's system prompt is its role template, followed by the context
//! sections named in the dispatch table, followed by the reply format.

use crate::config::loader::parse_prompt;
use crate::dataset::Table;
use crate::dataset::TableError;
use crate::init::get_template;
use crate::registry::stage_spec;
use crate::registry::Accumulator;
use crate::registry::ContextField;
use crate::registry::ExecutorKind;
use ce_protocol::AgentState;
use ce_protocol::PromptTemplate;
use ce_protocol::WorkflowStage;
use std::collections::HashMap;
use std::fmt::Write as _;
use tracing::warn;

/// Rows of the dataset shown in table-scoped prompts and report previews.
pub const PREVIEW_ROWS: usize = 5;

const CODE_PROTOCOL: &str = r#"Reply with exactly one JSON object and nothing else.
To run Python against the dataset (bound to `df`), reply {"code": "<python source>"}. You will receive what the code printed, or the error it raised.
When you know the result, reply {"output_format": "<the result>"}."#;

/// Role templates for every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptBook {
    templates: HashMap<WorkflowStage, String>,
}

impl PromptBook {
    /// Templates embedded in the binary.
    pub fn builtin() -> Self {
        let templates = WorkflowStage::ALL
            .iter()
            .map(|stage| (*stage, builtin_template(*stage)))
            .collect();
        Self { templates }
    }

    /// Replaces the templates of the stages present in `overrides`.
    pub fn with_overrides(mut self, overrides: Vec<PromptTemplate>) -> Self {
        for prompt in overrides {
            self.templates.insert(prompt.stage, prompt.body);
        }
        self
    }

    pub fn template(&self, stage: WorkflowStage) -> &str {
        self.templates.get(&stage).map(String::as_str).unwrap_or_default()
    }

    /// Builds the full system prompt for `stage` from the current state.
    ///
    /// Fails only when a table section is needed and `df` does not decode.
    pub fn system_prompt(
        &self,
        stage: WorkflowStage,
        state: &AgentState,
    ) -> Result<String, TableError> {
        let spec = stage_spec(stage);
        let mut prompt = self.template(stage).to_string();

        for field in spec.context {
            match field {
                ContextField::Accumulated(accumulator) => {
                    if let Some(output) = accumulator.slot(state) {
                        section(&mut prompt, heading(*accumulator), &output.render());
                    }
                }
                ContextField::DatasetPreview => {
                    let table = Table::from_records_json(&state.df)?;
                    section(&mut prompt, "DATASET PREVIEW", &table.preview(PREVIEW_ROWS));
                }
            }
        }

        match spec.executor {
            ExecutorKind::Reasoning => {
                section(&mut prompt, "OUTPUT FORMAT", &spec.shape.format_instructions());
            }
            ExecutorKind::TabularData => {
                let table = Table::from_records_json(&state.df)?;
                section(&mut prompt, "TABLE", &table.describe(PREVIEW_ROWS));
                section(&mut prompt, "OUTPUT FORMAT", &spec.shape.format_instructions());
            }
            ExecutorKind::CodeExecution => {
                let table = Table::from_records_json(&state.df)?;
                section(&mut prompt, "TABLE", &table.describe(PREVIEW_ROWS));
                section(&mut prompt, "REPLY PROTOCOL", CODE_PROTOCOL);
            }
        }

        Ok(prompt)
    }
}

impl Default for PromptBook {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_template(stage: WorkflowStage) -> String {
    let parsed = get_template(&format!("prompts/{stage}.md")).map(|content| parse_prompt(&content));
    match parsed {
        Some(Ok(prompt)) if !prompt.body.is_empty() => prompt.body,
        _ => {
            warn!(stage = %stage, "embedded prompt missing or invalid");
            format!("You are the {}.", stage_spec(stage).node_name)
        }
    }
}

fn heading(accumulator: Accumulator) -> &'static str {
    match accumulator {
        Accumulator::Metadata => "DATASET METADATA",
        Accumulator::Statistics => "PROPOSED STATISTICAL ANALYSES",
        Accumulator::Insights => "BUSINESS INSIGHTS",
    }
}

fn section(prompt: &mut String, title: &str, body: &str) {
    let _ = write!(prompt, "\n\n## {title}\n{}", body.trim_end());
}
