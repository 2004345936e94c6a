//! Ring Identifier Space
//!
//! Every node address and every key is hashed (SHA-1) into the same 160-bit
//! circular identifier space. Ring order is the natural modular order of these
//! identifiers: a node owns the keys in `(predecessor, self]`.
//!
//! ## Core Primitives
//! - **`RingId`**: a 160-bit identifier, compared as a big-endian unsigned integer.
//! - **`between`**: circular-interval membership, the single test behind every
//!   ownership and ordering decision in the crate.
//! - **`RingId::add_pow2`**: `(id + 2^i) mod 2^160`, the finger table targets.

pub mod id;

pub use id::{ID_BITS, RingId, between};
