//! # ce-protocol
//!
//! Shared data models for cognito-eda.
//!
//! This crate defines the structures exchanged between the workflow core and
//! its consumers:
//! - Stage tags and typed stage outputs
//! - The agent state threaded through a run
//! - Run parameters and the `config.toml` / prompt file models
//! - Progress events and run ledger listings
//!
//! ## Modules
//!
//! - [`stage_models`]: `WorkflowStage`, `StageOutput`, `Insight`
//! - [`state_models`]: `AgentState` and its history records
//! - [`config_models`]: `RunConfiguration`, `RunSettings`, `GlobalConfig`
//! - [`prompt_models`]: Prompt override templates
//! - [`ipc`]: `RunEvent` progress stream
//! - [`ledger_models`]: Run listings and stage snapshots
//!
//! All types derive `TS` so a UI client can share them.

pub mod config_models;
pub mod ipc;
pub mod ledger_models;
pub mod prompt_models;
pub mod stage_models;
pub mod state_models;

pub use config_models::*;
pub use ipc::*;
pub use ledger_models::*;
pub use prompt_models::*;
pub use stage_models::*;
pub use state_models::*;
