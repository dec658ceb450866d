//! # rn-protocol
//!
//! Shared protocol definitions and data models for runnode.
//!
//! This crate defines all data structures exchanged between a worker and
//! its callers:
//! - Worker status snapshots returned by `status`
//! - Request/response bodies of the worker RPC operations
//! - Name registry records
//! - Worker configuration loaded from `runnode.toml`
//!
//! ## Modules
//!
//! - [`worker_models`]: Worker lifecycle state and status snapshot
//! - [`rpc`]: Request and response bodies for the exposed operations
//! - [`registry_models`]: Name registry records
//! - [`config_models`]: Worker configuration
//! - [`series`]: AA-style run series numbering
//!
//! ## Design Principles
//!
//! - Minimal dependencies: only serde, ts-rs, uuid and chrono
//! - TypeScript generation: wire types derive `TS` for dashboard compatibility
//! - Independent compilation: no dependencies on other runnode crates

pub mod config_models;
pub mod registry_models;
pub mod rpc;
pub mod series;
pub mod worker_models;

// Re-export all public types for convenience
pub use config_models::*;
pub use registry_models::*;
pub use rpc::*;
pub use series::*;
pub use worker_models::*;
