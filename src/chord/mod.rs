//! Ring Protocol Engine
//!
//! A `ChordNode` is one member of the ring. Its behaviour is split by concern:
//!
//! - **`node`**: state, lifecycle (create / join / clear) and the join-time key split.
//! - **`routing`**: FindSuccessor, ClosestPrecedingNode, FirstValidSuccessor, FixFingers.
//! - **`maintenance`**: the Stabilize / CheckPredecessor / FixFingers loops and Notify.
//! - **`replication`**: owner-side writes mirrored to the successor, client lookups,
//!   and failover promotion of the backup store.
//! - **`protocol`** / **`handlers`**: the ring calls exposed to peers.
//!
//! There is no coordinator: every decision is local, and the ring converges
//! through periodic stabilization. Finger entries are hints only; correctness
//! rests on the successor list.

pub mod handlers;
pub mod maintenance;
pub mod node;
pub mod protocol;
pub mod replication;
pub mod routing;
pub mod types;

pub use node::ChordNode;
pub use types::{FINGER_LEN, FingerTable, NodeSnapshot, SUCCESSOR_LEN, SuccessorList};
