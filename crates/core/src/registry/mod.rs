//! Stage registry: the ordered stage catalog and its successor lookup.
//!
//! The registry is pure data. It answers "which stage follows X" in O(1)
//! through a successor table built once from the configured sequence.

pub mod dispatch;

use ce_protocol::WorkflowStage;
use std::collections::HashMap;
use thiserror::Error;

pub use dispatch::stage_spec;
pub use dispatch::Accumulator;
pub use dispatch::ContextField;
pub use dispatch::ExecutorKind;
pub use dispatch::StageSpec;

use crate::executors::output::OutputShape;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Stage sequence is empty")]
    Empty,

    #[error("Stage '{0}' appears more than once in the sequence")]
    DuplicateStage(WorkflowStage),

    #[error("Final stage '{0}' does not produce an HTML report")]
    TerminalWithoutReport(WorkflowStage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRegistry {
    sequence: Vec<WorkflowStage>,
    successors: HashMap<WorkflowStage, WorkflowStage>,
}

impl StageRegistry {
    /// metadata → structure → statistics → coding → insights → report.
    pub fn standard() -> Self {
        Self::build(vec![
            WorkflowStage::MetadataExtraction,
            WorkflowStage::StructureCreation,
            WorkflowStage::StatisticsGeneration,
            WorkflowStage::TabularDataCoding,
            WorkflowStage::BusinessInsightGeneration,
            WorkflowStage::WebReportGeneration,
        ])
    }

    /// The standard sequence with a table-answering step after metadata
    /// extraction, so the metadata questions are answered against the data
    /// before they are structured.
    pub fn with_table_profiling() -> Self {
        Self::build(vec![
            WorkflowStage::MetadataExtraction,
            WorkflowStage::TabularAnalysis,
            WorkflowStage::StructureCreation,
            WorkflowStage::StatisticsGeneration,
            WorkflowStage::TabularDataCoding,
            WorkflowStage::BusinessInsightGeneration,
            WorkflowStage::WebReportGeneration,
        ])
    }

    /// Validates a configured sequence.
    pub fn from_sequence(sequence: Vec<WorkflowStage>) -> Result<Self, RegistryError> {
        let Some(last) = sequence.last().copied() else {
            return Err(RegistryError::Empty);
        };
        for (index, stage) in sequence.iter().enumerate() {
            if sequence[..index].contains(stage) {
                return Err(RegistryError::DuplicateStage(*stage));
            }
        }
        if stage_spec(last).shape != OutputShape::Html {
            return Err(RegistryError::TerminalWithoutReport(last));
        }
        Ok(Self::build(sequence))
    }

    fn build(sequence: Vec<WorkflowStage>) -> Self {
        let successors = sequence
            .windows(2)
            .map(|pair| (pair[0], pair[1]))
            .collect();
        Self {
            sequence,
            successors,
        }
    }

    /// First stage of a run.
    pub fn entry(&self) -> WorkflowStage {
        self.sequence[0]
    }

    /// Stage whose output is the report.
    pub fn terminal(&self) -> WorkflowStage {
        self.sequence[self.sequence.len() - 1]
    }

    /// Successor of `current`, or `None` when `current` is terminal or unknown.
    pub fn next_stage(&self, current: WorkflowStage) -> Option<WorkflowStage> {
        self.successors.get(&current).copied()
    }

    /// Prefix-matching form: the stage at position `completed.len()` when
    /// `completed` is a prefix of the sequence, `None` otherwise.
    pub fn next_after(&self, completed: &[WorkflowStage]) -> Option<WorkflowStage> {
        if self.sequence.starts_with(completed) {
            self.sequence.get(completed.len()).copied()
        } else {
            None
        }
    }

    pub fn position(&self, stage: WorkflowStage) -> Option<usize> {
        self.sequence.iter().position(|s| *s == stage)
    }

    pub fn contains(&self, stage: WorkflowStage) -> bool {
        self.position(stage).is_some()
    }

    pub fn stages(&self) -> &[WorkflowStage] {
        &self.sequence
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
