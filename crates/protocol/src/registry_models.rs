//! Name registry records.
//!
//! Workers register their RPC address under their name; callers look the
//! name up to find the worker.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Body of a registration request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct Registration {
    /// Base URL of the worker's RPC endpoint, e.g. `http://modelsrv2:7766`.
    pub address: String,
}

/// A resolved registry entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, TS)]
pub struct NameRecord {
    pub name: String,
    pub address: String,
}
