//! Configuration models that aggregate all settings.

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use crate::registry::StageRegistry;
use ce_protocol::GlobalConfig;
use ce_protocol::PromptTemplate;
use ce_protocol::RunConfiguration;
use std::path::Path;
use std::path::PathBuf;

/// Unified application configuration loaded from `.cognito-eda/`.
///
/// - `config.toml`: Global settings
/// - `prompts/*.md`: Per-stage prompt overrides
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Global settings from `config.toml`.
    pub global: GlobalConfig,

    /// Prompt overrides loaded from `prompts/*.md`.
    pub prompts: Vec<PromptTemplate>,
}

impl AppConfig {
    /// The configured stage sequence, or the standard one when none is set.
    pub fn registry(&self) -> ConfigResult<StageRegistry> {
        if self.global.pipeline.stages.is_empty() {
            return Ok(StageRegistry::standard());
        }
        StageRegistry::from_sequence(self.global.pipeline.stages.clone()).map_err(|e| {
            ConfigError::InvalidConfig {
                path: PathBuf::from("config.toml"),
                reason: format!("[pipeline] stages: {e}"),
            }
        })
    }

    /// Directory holding run directories, resolved against `root`.
    pub fn logs_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.global.logs_dir)
    }
}

/// Checks run parameters before a run starts.
pub fn validate_run_configuration(config: &RunConfiguration) -> ConfigResult<()> {
    if config.run_id.trim().is_empty() {
        return Err(ConfigError::InvalidRunParameter {
            field: "run_id",
            reason: "must not be empty".to_string(),
        });
    }
    if !(0.0..=1.0).contains(&config.temperature) {
        return Err(ConfigError::InvalidRunParameter {
            field: "temperature",
            reason: format!("{} is outside 0.0..=1.0", config.temperature),
        });
    }
    Ok(())
}
