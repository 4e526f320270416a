//! # ce-core
//!
//! Workflow orchestration for cognito-eda.
//!
//! This crate provides:
//! - Configuration loading from the `.cognito-eda/` directory
//! - The stage registry and its dispatch table
//! - Language model and code sandbox capabilities
//! - Stage executors and the retry discipline around model calls
//! - The orchestrator, run manager and run ledger
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and run parameter validation
//! - [`dataset`]: Tabular dataset decoding and profiling
//! - [`engine`]: The run orchestrator
//! - [`executors`]: Reasoning, tabular and code-execution stages
//! - [`init`]: Project scaffolding
//! - [`ledger`]: Durable per-run record store
//! - [`models`]: Language model trait and providers
//! - [`registry`]: Stage sequence and dispatch table
//! - [`sandbox`]: Code execution bound to the dataset
//! - [`state`]: State transitions and run management

pub mod config;
pub mod dataset;
pub mod engine;
pub mod executors;
pub mod init;
pub mod ledger;
pub mod models;
pub mod registry;
pub mod sandbox;
pub mod state;
