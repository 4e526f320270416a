//! Language model capability injected into the orchestrator.
//!
//! - [`LanguageModel`]: streaming model trait
//! - [`GeminiModel`]: HTTP provider
//! - [`ScriptedModel`]: deterministic replies for tests and demo runs
//! - [`ModelFactory`]: builds a model from `[model]` settings

pub mod base;
pub mod factory;
pub mod gemini;
pub mod provider;
pub mod scripted;

pub use base::collect_reply;
pub use base::LanguageModel;
pub use base::ModelError;
pub use base::ModelEvent;
pub use base::ModelRequest;
pub use base::ModelStream;
pub use factory::ModelFactory;
pub use gemini::GeminiModel;
pub use provider::ModelProvider;
pub use scripted::ScriptedModel;
