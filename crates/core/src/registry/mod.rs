//! Name registry.
//!
//! Workers are addressed by name. A worker registers `name -> address` at
//! startup and removes the entry on shutdown; callers resolve a name before
//! invoking a worker.
//!
//! - [`name_server`]: in-memory registry served over HTTP
//! - [`client`]: typed client for any registry speaking the same routes

pub mod client;
pub mod name_server;

pub use client::{RegistryClient, RegistryError};
pub use name_server::{serve_name_server, NameServer};
