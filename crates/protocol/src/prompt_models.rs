//! Prompt template models for `.cognito-eda/prompts/*.md`.
//!
//! A prompt file overrides the role instructions of one stage. The YAML front
//! matter names the stage; the body is the instruction text.

use serde::Deserialize;
use serde::Serialize;
use ts_rs::TS;

use crate::stage_models::WorkflowStage;

/// Role instructions for a single stage.
///
/// # Example
///
/// ```markdown
/// ---
/// stage: statistics_generation
/// description: Proposes statistical analyses
/// ---
///
/// You are a senior statistician. Propose analyses that ...
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
pub struct PromptTemplate {
    /// Stage whose instructions this template replaces.
    pub stage: WorkflowStage,

    #[serde(default)]
    pub description: String,

    /// The Markdown body following the front matter.
    #[serde(skip)]
    pub body: String,
}
