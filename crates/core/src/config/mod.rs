//! Configuration loading and management.
//!
//! A worker reads [`WorkerConfig`](rn_protocol::WorkerConfig) from
//! `runnode.toml`, then applies `RUNNODE_*` environment overrides. Command
//! line flags are applied last by the binary.

pub mod error;
pub mod loader;

pub use loader::{advertise_url, apply_env_overrides, host_name, load_config, resolve_name};
