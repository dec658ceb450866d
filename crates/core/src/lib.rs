//! # rn-core
//!
//! Worker-side run controller for runnode.
//!
//! This crate provides:
//! - Script loading and step filtering
//! - A single-slot process runner
//! - The run controller state machine (one job at a time, fail-fast scripts)
//! - Completion reports to the run ledger
//! - The worker RPC endpoint and its client
//! - A name registry (server and client)
//! - Configuration, logging and shutdown plumbing for the binary
//!
//! ## Modules
//!
//! - [`script`]: Script lines and executable steps
//! - [`process`]: Process runner
//! - [`controller`]: Run controller
//! - [`reporter`]: Completion reporter
//! - [`rpc`]: HTTP routes and worker client
//! - [`registry`]: Name server and registry client
//! - [`node`]: Worker bootstrap
//! - [`config`]: Configuration loading

pub mod config;
pub mod controller;
pub mod logging;
pub mod node;
pub mod process;
pub mod registry;
pub mod reporter;
pub mod rpc;
pub mod script;
pub mod shutdown;
