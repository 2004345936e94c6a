//! Chord Distributed Hash Table Library
//!
//! Each process runs one node of a peer-to-peer ring. Nodes and keys are hashed
//! into the same 160-bit identifier space; a key lives on the first node whose
//! identifier follows it clockwise, and is mirrored on that node's successor so
//! a single crash loses nothing. The binary (`main.rs`) wraps one node in a
//! small operator CLI.
//!
//! ## Architecture Modules
//!
//! - **`ring`**: the identifier space: SHA-1 ids and the circular interval test.
//! - **`chord`**: ring membership and routing: successor list, predecessor, finger
//!   table, the periodic maintenance loops, and replication/failover driving.
//! - **`storage`**: the node-local primary and backup maps and their wire surface.
//! - **`rpc`**: JSON-over-HTTP transport: dial/timeout policy, liveness probe,
//!   and the router serving every remote method.
//! - **`dht`**: the node façade (lifecycle plus guarded Put/Get/Delete) and the
//!   plain-text backup artifact.
//! - **`config`** / **`error`**: tunables and the error taxonomy.

pub mod chord;
pub mod config;
pub mod dht;
pub mod error;
pub mod ring;
pub mod rpc;
pub mod storage;

pub use config::NodeConfig;
pub use dht::DhtNode;
pub use error::{ChordError, Result};
