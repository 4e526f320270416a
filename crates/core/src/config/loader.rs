//! Configuration file loader for the `.cognito-eda/` directory.
//!
//! Loads:
//! - `config.toml`: Global settings
//! - `prompts/*.md`: Prompt overrides with YAML front matter

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use crate::config::models::AppConfig;
use ce_protocol::GlobalConfig;
use ce_protocol::PromptTemplate;
use gray_matter::engine::YAML;
use gray_matter::Matter;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Name of the project configuration directory.
pub const CONFIG_DIR: &str = ".cognito-eda";

/// Loads all configuration from the `.cognito-eda/` directory.
///
/// Missing directories and files fall back to defaults; files that exist but
/// do not parse are errors.
///
/// # Example
///
/// ```rust,no_run
/// use ce_core::config::load_config;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new(".")).await?;
/// println!("Loaded {} prompt overrides", config.prompts.len());
/// # Ok(())
/// # }
/// ```
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let config_dir = root.join(CONFIG_DIR);

    if !config_dir.exists() {
        debug!(path = %config_dir.display(), "no config directory, using defaults");
        return Ok(AppConfig::default());
    }

    let global = load_global_config(&config_dir)?;
    let prompts = load_prompts(&config_dir)?;
    debug!(prompts = prompts.len(), "configuration loaded");

    Ok(AppConfig { global, prompts })
}

fn load_global_config(config_dir: &Path) -> ConfigResult<GlobalConfig> {
    let config_path = config_dir.join("config.toml");

    if !config_path.exists() {
        return Ok(GlobalConfig::default());
    }

    let content =
        std::fs::read_to_string(&config_path).map_err(|source| ConfigError::FileRead {
            path: config_path.clone(),
            source,
        })?;

    let config: GlobalConfig =
        toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
            path: config_path,
            source,
        })?;

    Ok(config)
}

fn load_prompts(config_dir: &Path) -> ConfigResult<Vec<PromptTemplate>> {
    let prompts_dir = config_dir.join("prompts");

    if !prompts_dir.exists() {
        return Ok(Vec::new());
    }

    let mut prompts: Vec<PromptTemplate> = Vec::new();

    for entry in WalkDir::new(&prompts_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| ConfigError::DirectoryWalk {
            path: prompts_dir.clone(),
            source,
        })?;

        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("md") {
            continue;
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let prompt = parse_prompt(&content).map_err(|reason| ConfigError::MarkdownParse {
            path: path.to_path_buf(),
            reason,
        })?;

        if prompts.iter().any(|existing| existing.stage == prompt.stage) {
            return Err(ConfigError::InvalidConfig {
                path: path.to_path_buf(),
                reason: format!("a prompt for stage '{}' is already defined", prompt.stage),
            });
        }

        if prompt.body.is_empty() {
            return Err(ConfigError::InvalidConfig {
                path: path.to_path_buf(),
                reason: "prompt body is empty".to_string(),
            });
        }

        prompts.push(prompt);
    }

    Ok(prompts)
}

/// Splits a prompt file into its front matter and trimmed body.
pub(crate) fn parse_prompt(content: &str) -> Result<PromptTemplate, String> {
    let matter = Matter::<YAML>::new();
    let result = matter.parse(content);

    let mut prompt: PromptTemplate = result
        .data
        .ok_or_else(|| "Missing YAML front matter".to_string())?
        .deserialize()
        .map_err(|e| format!("Failed to deserialize front matter: {e}"))?;
    prompt.body = result.content.trim().to_string();
    Ok(prompt)
}
