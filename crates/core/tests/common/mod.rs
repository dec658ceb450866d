//! Common test utilities for the integration tests.
//!
//! This module provides:
//! - A completion reporter that records what it receives
//! - Controller and script fixtures
//! - Polling helpers for background jobs

pub mod fixtures;
pub mod reporters;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use reporters::*;
