//! Builds the language model a run is injected with.

use crate::models::base::LanguageModel;
use crate::models::gemini::GeminiModel;
use crate::models::provider::ModelProvider;
use crate::models::scripted::ScriptedModel;
use anyhow::anyhow;
use anyhow::Result;
use ce_protocol::ModelSettings;
use std::sync::Arc;
use tracing::info;

pub struct ModelFactory;

impl ModelFactory {
    /// Create a model from the `[model]` settings.
    ///
    /// - Gemini models → `GeminiModel`, keyed from the environment
    /// - `scripted` / `demo` → `ScriptedModel::demo()`
    /// - anything else is rejected
    pub fn create(settings: &ModelSettings) -> Result<Arc<dyn LanguageModel>> {
        let provider = ModelProvider::from_model_name(&settings.name)
            .ok_or_else(|| anyhow!("Unsupported model '{}'", settings.name))?;
        info!(model = %settings.name, provider = provider.name(), "creating language model");

        match provider {
            ModelProvider::Gemini => {
                let model = GeminiModel::from_env(&settings.name, settings.api_key_env.as_deref())?;
                Ok(Arc::new(model))
            }
            ModelProvider::Scripted => Ok(Arc::new(ScriptedModel::demo())),
        }
    }
}
