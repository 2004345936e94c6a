//! Error types for ring nodes.
//!
//! Transport-level failures (`Transport`, `Timeout`, `Remote`) and routing dead
//! ends are retryable; `NotFound` is an ordinary outcome that callers usually
//! turn into a boolean.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChordError {
    /// Connection or protocol failure talking to a peer.
    #[error("transport error talking to {addr}: {reason}")]
    Transport { addr: String, reason: String },

    /// The peer did not answer within the call timeout.
    #[error("call to {addr} timed out")]
    Timeout { addr: String },

    /// Empty or malformed peer address; never retried.
    #[error("invalid address: {0:?}")]
    InvalidAddress(String),

    #[error("key not found: {0}")]
    NotFound(String),

    /// FindSuccessor exhausted its hop budget or found no live successor.
    #[error("routing failed: {0}")]
    Routing(String),

    #[error("join via {bootstrap} failed: {reason}")]
    JoinFailure { bootstrap: String, reason: String },

    #[error("node {0} is not listening")]
    NotListening(String),

    /// Lifecycle call that requires a stopped node.
    #[error("node {0} is already running")]
    AlreadyRunning(String),

    /// The peer answered with an application-level error status.
    #[error("{addr} rejected {endpoint} with status {status}")]
    Remote {
        addr: String,
        endpoint: String,
        status: u16,
    },

    #[error("malformed backup record at line {line}: {content:?}")]
    MalformedRecord { line: usize, content: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChordError {
    /// Whether a caller may reasonably try the same operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChordError::Transport { .. }
                | ChordError::Timeout { .. }
                | ChordError::Routing(_)
                | ChordError::Remote { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ChordError>;
