//! Common test utilities shared by the integration tests.
//!
//! This module provides:
//! - Fixtures (datasets, provisioned runs, scripted models)
//! - Custom assertions over run events and ledgers

pub mod assertions;
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
