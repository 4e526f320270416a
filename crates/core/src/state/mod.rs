//! Agent state transitions and run management.
//!
//! This module provides:
//! - Pure state transition functions applied after each stage
//! - RunManager for running and cancelling runs in the background

pub mod manager;
pub mod transition;

pub use manager::RunManager;
