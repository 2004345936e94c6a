//! Node Façade
//!
//! `DhtNode` is what a CLI or a test harness drives: it owns the listener and
//! the maintenance tasks of one `ChordNode`, and wraps Put/Get/Delete with the
//! "must be listening" precondition and a bounded client-side retry.
//!
//! `backup` defines the plain-text artifact `dump` writes and `restore` replays.

pub mod backup;
pub mod service;

pub use service::{DEFAULT_HOST, DhtNode};

#[cfg(test)]
mod tests;
