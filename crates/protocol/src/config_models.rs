//! Run parameters and the project configuration file models.
//!
//! [`GlobalConfig`] mirrors `.cognito-eda/config.toml`. [`RunSettings`] is the
//! snapshot saved into a run directory when a run is provisioned, and
//! [`RunConfiguration`] is the read-only view the orchestrator consumes.

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::stage_models::WorkflowStage;

pub const DEFAULT_RETRY_LIMIT: u32 = 3;
pub const DEFAULT_SLEEP_SECONDS: u64 = 30;
pub const DEFAULT_TEMPERATURE: f32 = 1.0;
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 5;
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// The modelling task the dataset is being explored for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    Classification,
    Regression,
    Clustering,
    TimeSeries,
    AnomalyDetection,
}

impl ProblemType {
    pub fn label(&self) -> &'static str {
        match self {
            ProblemType::Classification => "Classification",
            ProblemType::Regression => "Regression",
            ProblemType::Clustering => "Clustering",
            ProblemType::TimeSeries => "Time Series",
            ProblemType::AnomalyDetection => "Anomaly Detection",
        }
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ProblemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "classification" => Ok(ProblemType::Classification),
            "regression" => Ok(ProblemType::Regression),
            "clustering" => Ok(ProblemType::Clustering),
            "timeseries" => Ok(ProblemType::TimeSeries),
            "anomalydetection" => Ok(ProblemType::AnomalyDetection),
            _ => Err(format!("unknown problem type '{s}'")),
        }
    }
}

/// Per-run parameters, fixed at run start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct RunConfiguration {
    /// Partition key for the run ledger.
    pub run_id: String,
    /// Model invocations allowed per work item before the stage fails.
    pub retry_limit: u32,
    /// Delay between a failed attempt and its retry, and between work items.
    pub sleep_seconds: u64,
    /// Sampling temperature in `0.0..=1.0`.
    pub temperature: f32,
    /// Code execution round trips allowed per work item.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
}

impl RunConfiguration {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            retry_limit: DEFAULT_RETRY_LIMIT,
            sleep_seconds: DEFAULT_SLEEP_SECONDS,
            temperature: DEFAULT_TEMPERATURE,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}

/// The configuration snapshot stored as `config.json` in a run directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct RunSettings {
    pub run_id: String,
    pub target_column: String,
    pub problem_type: ProblemType,
    /// File name of the dataset as provided by the user.
    pub dataset_name: String,
    pub model: String,
    pub retry_limit: u32,
    pub sleep_seconds: u64,
    pub temperature: f32,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
    pub created_at: DateTime<Utc>,
}

impl RunSettings {
    /// Creates settings with a fresh run identifier and default parameters.
    pub fn new(
        target_column: impl Into<String>,
        problem_type: ProblemType,
        dataset_name: impl Into<String>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            target_column: target_column.into(),
            problem_type,
            dataset_name: dataset_name.into(),
            model: DEFAULT_MODEL.to_string(),
            retry_limit: DEFAULT_RETRY_LIMIT,
            sleep_seconds: DEFAULT_SLEEP_SECONDS,
            temperature: DEFAULT_TEMPERATURE,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            created_at: Utc::now(),
        }
    }

    pub fn with_run_defaults(mut self, defaults: &RunDefaults) -> Self {
        self.retry_limit = defaults.retry_limit;
        self.sleep_seconds = defaults.sleep_seconds;
        self.temperature = defaults.temperature;
        self.max_tool_rounds = defaults.max_tool_rounds;
        self
    }

    pub fn run_configuration(&self) -> RunConfiguration {
        RunConfiguration {
            run_id: self.run_id.clone(),
            retry_limit: self.retry_limit,
            sleep_seconds: self.sleep_seconds,
            temperature: self.temperature,
            max_tool_rounds: self.max_tool_rounds,
        }
    }

    /// The instruction that seeds the entry stage.
    pub fn initial_task(&self) -> String {
        format!(
            "The target column is `{}` and this is a `{}` use case.",
            self.target_column, self.problem_type
        )
    }
}

/// `[run]` section: defaults applied to newly provisioned runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct RunDefaults {
    pub retry_limit: u32,
    pub sleep_seconds: u64,
    pub temperature: f32,
    pub max_tool_rounds: u32,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            retry_limit: DEFAULT_RETRY_LIMIT,
            sleep_seconds: DEFAULT_SLEEP_SECONDS,
            temperature: DEFAULT_TEMPERATURE,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }
}

/// `[model]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct ModelSettings {
    /// Model name; the provider is inferred from it.
    pub name: String,
    /// Environment variable holding the API key. Falls back to the provider default.
    pub api_key_env: Option<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL.to_string(),
            api_key_env: None,
        }
    }
}

/// `[sandbox]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct SandboxSettings {
    pub python: String,
    pub timeout_seconds: u64,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            timeout_seconds: 60,
        }
    }
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct PipelineSettings {
    /// Stage sequence override. Empty means the standard sequence.
    pub stages: Vec<WorkflowStage>,
}

/// Represents `.cognito-eda/config.toml`.
///
/// # Example
///
/// ```toml
/// logs_dir = "logs"
///
/// [run]
/// retry_limit = 3
/// sleep_seconds = 30
/// temperature = 1.0
///
/// [model]
/// name = "gemini-2.5-flash"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct GlobalConfig {
    /// Directory holding one subdirectory per run.
    pub logs_dir: String,
    pub run: RunDefaults,
    pub model: ModelSettings,
    pub sandbox: SandboxSettings,
    pub pipeline: PipelineSettings,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            logs_dir: "logs".to_string(),
            run: RunDefaults::default(),
            model: ModelSettings::default(),
            sandbox: SandboxSettings::default(),
            pipeline: PipelineSettings::default(),
        }
    }
}

fn default_max_tool_rounds() -> u32 {
    DEFAULT_MAX_TOOL_ROUNDS
}
