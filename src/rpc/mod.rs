//! Transport Module
//!
//! The RPC substrate every remote operation goes through: JSON over HTTP, served
//! by axum and called with reqwest.
//!
//! - **`client`**: dial-with-retry, call-with-timeout and the TCP liveness probe.
//! - **`server`**: the router exposing the remote method surface, and the guard
//!   that makes a stopped node answer like a dead one.
//!
//! Endpoint paths and DTOs live next to the code they serve, in
//! `crate::chord::protocol` and `crate::storage::protocol`.

pub mod client;
pub mod server;

pub use client::{RpcClient, validate_address};

#[cfg(test)]
mod tests;
