//! Worker configuration models for `runnode.toml`.
//!
//! This module defines the structure of the configuration file read by a
//! worker at startup. Every field has a default, so an absent or empty file
//! yields a usable configuration.

use serde::Deserialize;
use serde::Serialize;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

/// Default port of the worker RPC endpoint.
pub const DEFAULT_WORKER_PORT: u16 = 7766;

/// Default port of the name server.
pub const DEFAULT_REGISTRY_PORT: u16 = 9090;

/// Settings of one worker process.
///
/// # Example
///
/// ```toml
/// # runnode.toml
/// name = "modelsrv2"
/// listen = "0.0.0.0:7766"
/// registry_url = "http://nameserver:9090"
/// ledger_url = "http://dashboard"
/// work_root = "D:/runs"
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Name to register under; the host name when absent.
    pub name: Option<String>,

    /// Address the RPC endpoint binds to.
    pub listen: SocketAddr,

    /// URL callers should use to reach this worker.
    ///
    /// Derived from the worker name and listen port when absent.
    pub advertise_url: Option<String>,

    /// Base URL of the name registry.
    pub registry_url: String,

    /// Base URL of the run ledger that receives completion callbacks.
    pub ledger_url: String,

    /// Directory under which `<project>/<series>` job directories are created.
    pub work_root: PathBuf,

    /// File name, inside the job directory, that collects step output.
    pub process_log: String,

    /// Local operational log file.
    pub log_file: PathBuf,

    /// Timeout for the completion callback, in seconds.
    pub notify_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: None,
            listen: SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::UNSPECIFIED,
                DEFAULT_WORKER_PORT,
            )),
            advertise_url: None,
            registry_url: format!("http://localhost:{DEFAULT_REGISTRY_PORT}"),
            ledger_url: "http://localhost".to_string(),
            work_root: PathBuf::from("."),
            process_log: "stdout.log".to_string(),
            log_file: PathBuf::from("node.log"),
            notify_timeout_secs: 10,
        }
    }
}
