//! Worker RPC endpoint.
//!
//! The operations of a [`RunController`](crate::controller::RunController)
//! are exposed as HTTP/JSON routes by [`server`] and called by [`client`].

pub mod client;
pub mod server;

pub use client::{ClientError, ScriptReply, WorkerClient};
pub use server::{router, RpcError};
