//! Directory structure and file generation for `.cognito-eda/`.

use super::error::{InitError, InitResult};
use super::templates::{get_template, list_templates};
use crate::config::CONFIG_DIR;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Options for initializing a `.cognito-eda/` directory.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Directory in which `.cognito-eda/` will be created.
    pub target_dir: PathBuf,

    /// Overwrite an existing `.cognito-eda/` directory.
    pub force: bool,

    /// Only write `config.toml`; the built-in prompts stay in effect.
    pub minimal: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            target_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            force: false,
            minimal: false,
        }
    }
}

/// Generate the `.cognito-eda/` directory.
///
/// ```text
/// .cognito-eda/
/// ├── config.toml
/// └── prompts/            (unless minimal)
///     ├── metadata_extraction.md
///     └── ...
/// ```
///
/// Returns the paths written, in order.
pub async fn generate_project_structure(options: InitOptions) -> InitResult<Vec<PathBuf>> {
    let config_dir = options.target_dir.join(CONFIG_DIR);

    if config_dir.exists() && !options.force {
        return Err(InitError::DirectoryExists(config_dir));
    }

    fs::create_dir_all(&config_dir).map_err(|source| InitError::DirectoryCreate {
        path: config_dir.clone(),
        source,
    })?;

    let mut written = vec![write_template_file(&config_dir, "config.toml")?];
    if !options.minimal {
        for prompt_path in list_templates("prompts/") {
            written.push(write_template_file(&config_dir, &prompt_path)?);
        }
    }

    info!(path = %config_dir.display(), files = written.len(), "project initialized");
    Ok(written)
}

fn write_template_file(config_dir: &Path, template_path: &str) -> InitResult<PathBuf> {
    let content = get_template(template_path)
        .ok_or_else(|| InitError::TemplateNotFound(template_path.to_string()))?;

    let target_path = config_dir.join(template_path);

    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent).map_err(|source| InitError::DirectoryCreate {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(&target_path, content).map_err(|source| InitError::FileWrite {
        path: target_path.clone(),
        source,
    })?;

    Ok(target_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_generate_structure_success() {
        let dir = tempdir().expect("tempdir");
        let options = InitOptions {
            target_dir: dir.path().to_path_buf(),
            force: false,
            minimal: false,
        };

        let written = generate_project_structure(options).await.expect("init");

        let config_dir = dir.path().join(CONFIG_DIR);
        assert!(config_dir.join("config.toml").exists());
        assert!(config_dir.join("prompts/statistics_generation.md").exists());
        assert_eq!(written.len(), 8);
    }

    #[tokio::test]
    async fn test_generated_structure_loads_back() {
        let dir = tempdir().expect("tempdir");
        let options = InitOptions {
            target_dir: dir.path().to_path_buf(),
            force: false,
            minimal: false,
        };
        generate_project_structure(options).await.expect("init");

        let config = load_config(dir.path()).await.expect("config");
        assert_eq!(config.prompts.len(), 7);
        assert_eq!(config.global.run.retry_limit, 3);
    }

    #[tokio::test]
    async fn test_generate_structure_minimal() {
        let dir = tempdir().expect("tempdir");
        let options = InitOptions {
            target_dir: dir.path().to_path_buf(),
            force: false,
            minimal: true,
        };

        generate_project_structure(options).await.expect("init");

        let config_dir = dir.path().join(CONFIG_DIR);
        assert!(config_dir.join("config.toml").exists());
        assert!(!config_dir.join("prompts").exists());
    }

    #[tokio::test]
    async fn test_existing_directory_requires_force() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join(CONFIG_DIR)).expect("mkdir");

        let options = InitOptions {
            target_dir: dir.path().to_path_buf(),
            force: false,
            minimal: true,
        };
        let result = generate_project_structure(options.clone()).await;
        assert!(matches!(result, Err(InitError::DirectoryExists(_))));

        let forced = InitOptions {
            force: true,
            ..options
        };
        assert!(generate_project_structure(forced).await.is_ok());
    }
}
