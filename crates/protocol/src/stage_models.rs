//! Workflow stage tags and the typed outputs each stage produces.
//!
//! A run is a fixed sequence of stages. Each stage consumes the pending work
//! items left by the previous stage and produces a [`StageOutput`], which is
//! copied forward as the next stage's work.

use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

/// Identifies a position in the analysis workflow.
///
/// The ordering between stages is not encoded here; it is owned by the stage
/// registry in `ce-core` so that alternative sequences can be configured.
///
/// Serialized as snake_case tags:
/// ```json
/// "metadata_extraction"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    /// Derives the list of metadata questions to ask about the dataset.
    MetadataExtraction,
    /// Answers natural-language questions directly against the table.
    TabularAnalysis,
    /// Condenses collected answers into one structured document.
    StructureCreation,
    /// Proposes the statistical analyses to run.
    StatisticsGeneration,
    /// Computes the proposed analyses with generated code.
    TabularDataCoding,
    /// Turns computed results into business insights.
    BusinessInsightGeneration,
    /// Renders the final HTML report.
    WebReportGeneration,
}

impl WorkflowStage {
    /// Every stage tag, in declaration order.
    pub const ALL: [WorkflowStage; 7] = [
        WorkflowStage::MetadataExtraction,
        WorkflowStage::TabularAnalysis,
        WorkflowStage::StructureCreation,
        WorkflowStage::StatisticsGeneration,
        WorkflowStage::TabularDataCoding,
        WorkflowStage::BusinessInsightGeneration,
        WorkflowStage::WebReportGeneration,
    ];

    /// The wire tag for this stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStage::MetadataExtraction => "metadata_extraction",
            WorkflowStage::TabularAnalysis => "tabular_analysis",
            WorkflowStage::StructureCreation => "structure_creation",
            WorkflowStage::StatisticsGeneration => "statistics_generation",
            WorkflowStage::TabularDataCoding => "tabular_data_coding",
            WorkflowStage::BusinessInsightGeneration => "business_insight_generation",
            WorkflowStage::WebReportGeneration => "web_report_generation",
        }
    }
}

impl fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        WorkflowStage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == normalized)
            .ok_or_else(|| format!("unknown workflow stage '{s}'"))
    }
}

/// A chart the report should draw for an insight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct ChartSpec {
    pub title: String,
    /// Chart family, e.g. `bar`, `line`, `histogram`.
    pub kind: String,
    #[serde(default)]
    pub description: String,
}

/// One business insight derived from computed statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Insight {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub findings: Vec<String>,
    #[serde(default)]
    pub charts: Vec<ChartSpec>,
}

/// The typed result of a completed stage.
///
/// Serialized with an explicit kind tag:
/// ```json
/// { "kind": "items", "value": ["Count rows", "List dtypes"] }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StageOutput {
    /// An ordered list of short text items.
    Items(Vec<String>),
    /// A single document.
    Document(String),
    /// Structured insight records.
    Insights(Vec<Insight>),
    /// A complete HTML page.
    Html(String),
}

impl StageOutput {
    /// Converts this output into the work items handed to the next stage.
    ///
    /// Lists map element-wise, documents and pages become a single item,
    /// and insights become one JSON-rendered item each.
    pub fn work_items(&self) -> Vec<String> {
        match self {
            StageOutput::Items(items) => items.clone(),
            StageOutput::Document(text) | StageOutput::Html(text) => vec![text.clone()],
            StageOutput::Insights(insights) => insights
                .iter()
                .map(|insight| {
                    serde_json::to_string(insight).unwrap_or_else(|_| insight.name.clone())
                })
                .collect(),
        }
    }

    /// Renders this output as plain text for use as prompt context.
    pub fn render(&self) -> String {
        match self {
            StageOutput::Items(items) => items
                .iter()
                .map(|item| format!("- {item}"))
                .collect::<Vec<_>>()
                .join("\n"),
            StageOutput::Document(text) | StageOutput::Html(text) => text.clone(),
            StageOutput::Insights(insights) => serde_json::to_string_pretty(insights)
                .unwrap_or_else(|_| {
                    insights
                        .iter()
                        .map(|insight| format!("- {}: {}", insight.name, insight.description))
                        .collect::<Vec<_>>()
                        .join("\n")
                }),
        }
    }

    /// Returns the page body if this is an HTML output.
    pub fn as_html(&self) -> Option<&str> {
        match self {
            StageOutput::Html(html) => Some(html),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            StageOutput::Items(items) => items.is_empty(),
            StageOutput::Document(text) | StageOutput::Html(text) => text.trim().is_empty(),
            StageOutput::Insights(insights) => insights.is_empty(),
        }
    }
}
