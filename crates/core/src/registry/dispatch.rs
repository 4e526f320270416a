//! Stage dispatch table.
//!
//! Every per-stage decision (which executor runs it, what output it must
//! produce, which accumulator it fills, what context it reads) is declared
//! here once and looked up by tag.

use crate::executors::output::OutputShape;
use ce_protocol::AgentState;
use ce_protocol::StageOutput;
use ce_protocol::WorkflowStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutorKind {
    /// One model call over all pending items.
    Reasoning,
    /// Per-item questions answered against the decoded table.
    TabularData,
    /// Per-item computations through the code sandbox.
    CodeExecution,
}

/// Long-lived state slot filled by a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accumulator {
    Metadata,
    Statistics,
    Insights,
}

impl Accumulator {
    pub fn slot<'a>(&self, state: &'a AgentState) -> &'a Option<StageOutput> {
        match self {
            Accumulator::Metadata => &state.metadata,
            Accumulator::Statistics => &state.statistics,
            Accumulator::Insights => &state.insights,
        }
    }

    pub fn slot_mut<'a>(&self, state: &'a mut AgentState) -> &'a mut Option<StageOutput> {
        match self {
            Accumulator::Metadata => &mut state.metadata,
            Accumulator::Statistics => &mut state.statistics,
            Accumulator::Insights => &mut state.insights,
        }
    }
}

/// Read-only context a stage's prompt includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextField {
    Accumulated(Accumulator),
    /// The first rows of the dataset.
    DatasetPreview,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    pub stage: WorkflowStage,
    /// Name shown in progress events.
    pub node_name: &'static str,
    pub executor: ExecutorKind,
    pub shape: OutputShape,
    pub accumulator: Option<Accumulator>,
    pub context: &'static [ContextField],
}

const METADATA: ContextField = ContextField::Accumulated(Accumulator::Metadata);
const STATISTICS: ContextField = ContextField::Accumulated(Accumulator::Statistics);
const INSIGHTS: ContextField = ContextField::Accumulated(Accumulator::Insights);

static STAGE_SPECS: [StageSpec; 7] = [
    StageSpec {
        stage: WorkflowStage::MetadataExtraction,
        node_name: "Metadata Extractor Agent",
        executor: ExecutorKind::Reasoning,
        shape: OutputShape::TextList,
        accumulator: None,
        context: &[],
    },
    StageSpec {
        stage: WorkflowStage::TabularAnalysis,
        node_name: "Pandas Agent",
        executor: ExecutorKind::TabularData,
        shape: OutputShape::Answer,
        accumulator: None,
        context: &[],
    },
    StageSpec {
        stage: WorkflowStage::StructureCreation,
        node_name: "Structure Generator Agent",
        executor: ExecutorKind::Reasoning,
        shape: OutputShape::Document,
        accumulator: Some(Accumulator::Metadata),
        context: &[],
    },
    StageSpec {
        stage: WorkflowStage::StatisticsGeneration,
        node_name: "Statistician Agent",
        executor: ExecutorKind::Reasoning,
        shape: OutputShape::TextList,
        accumulator: Some(Accumulator::Statistics),
        context: &[METADATA],
    },
    StageSpec {
        stage: WorkflowStage::TabularDataCoding,
        node_name: "Python Coder Agent",
        executor: ExecutorKind::CodeExecution,
        shape: OutputShape::Answer,
        accumulator: None,
        context: &[METADATA],
    },
    StageSpec {
        stage: WorkflowStage::BusinessInsightGeneration,
        node_name: "Business Insight Agent",
        executor: ExecutorKind::Reasoning,
        shape: OutputShape::InsightList,
        accumulator: Some(Accumulator::Insights),
        context: &[METADATA, STATISTICS],
    },
    StageSpec {
        stage: WorkflowStage::WebReportGeneration,
        node_name: "Web Developer Agent",
        executor: ExecutorKind::Reasoning,
        shape: OutputShape::Html,
        accumulator: None,
        context: &[METADATA, STATISTICS, INSIGHTS, ContextField::DatasetPreview],
    },
];

/// Looks up the dispatch entry for a stage.
pub fn stage_spec(stage: WorkflowStage) -> &'static StageSpec {
    match stage {
        WorkflowStage::MetadataExtraction => &STAGE_SPECS[0],
        WorkflowStage::TabularAnalysis => &STAGE_SPECS[1],
        WorkflowStage::StructureCreation => &STAGE_SPECS[2],
        WorkflowStage::StatisticsGeneration => &STAGE_SPECS[3],
        WorkflowStage::TabularDataCoding => &STAGE_SPECS[4],
        WorkflowStage::BusinessInsightGeneration => &STAGE_SPECS[5],
        WorkflowStage::WebReportGeneration => &STAGE_SPECS[6],
    }
}
