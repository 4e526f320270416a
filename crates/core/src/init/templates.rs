//! Embedded template files for `.cognito-eda/` initialization.
//!
//! The workspace `templates/` directory is embedded at compile time. The same
//! prompt templates also serve as the built-in default prompts.

use rust_embed::RustEmbed;

/// Embedded template files from the `templates/` directory.
///
/// - `CARGO_MANIFEST_DIR` = `crates/core`
/// - `../../templates` = workspace root `templates/`
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../templates"]
pub struct TemplateAssets;

/// Get template file content by path.
///
/// # Example
/// ```
/// use ce_core::init::templates::get_template;
///
/// let config = get_template("config.toml").expect("config.toml should exist");
/// assert!(config.contains("[run]"));
/// ```
pub fn get_template(path: &str) -> Option<String> {
    TemplateAssets::get(path).map(|file| String::from_utf8_lossy(file.data.as_ref()).to_string())
}

/// List all template files under a directory prefix, sorted.
pub fn list_templates(prefix: &str) -> Vec<String> {
    let mut paths: Vec<String> = TemplateAssets::iter()
        .filter(|path| path.starts_with(prefix))
        .map(|path| path.to_string())
        .collect();
    paths.sort();
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use ce_protocol::WorkflowStage;

    #[test]
    fn test_config_template_parses() {
        let content = get_template("config.toml").expect("config.toml should be embedded");
        let config: ce_protocol::GlobalConfig =
            toml::from_str(&content).expect("template config should parse");
        assert_eq!(config.logs_dir, "logs");
        assert!(config.pipeline.stages.is_empty());
    }

    #[test]
    fn test_every_stage_has_a_prompt_template() {
        for stage in WorkflowStage::ALL {
            let path = format!("prompts/{stage}.md");
            let content = get_template(&path).unwrap_or_else(|| panic!("{path} missing"));
            assert!(content.contains(&format!("stage: {stage}")));
        }
        assert_eq!(list_templates("prompts/").len(), WorkflowStage::ALL.len());
    }

    #[test]
    fn test_get_nonexistent_template() {
        assert!(get_template("nonexistent.txt").is_none());
    }
}
