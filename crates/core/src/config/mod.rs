//! Configuration loading and management.
//!
//! This module loads `.cognito-eda/config.toml` and the prompt overrides in
//! `.cognito-eda/prompts/`, and validates run parameters.

pub mod error;
pub mod loader;
pub mod models;

pub use error::ConfigError;
pub use error::ConfigResult;
pub use loader::load_config;
pub use loader::CONFIG_DIR;
pub use models::validate_run_configuration;
pub use models::AppConfig;
