//! Replicated Storage Module
//!
//! Each node keeps two in-memory maps:
//! - **Primary**: the keys whose hash falls in `(predecessor, self]`. Guarded by a
//!   read/write lock; `Get` readers run concurrently, writers are exclusive.
//! - **Backup**: a full replica of the predecessor's primary map, guarded by its own
//!   mutex. When the predecessor dies this node promotes the backup into its primary.
//!
//! The two locks are always taken in the order backup -> primary, and only
//! failover promotion ever holds both.
//!
//! `memory` holds the local maps; `handlers` and `protocol` expose the Put/Get/Delete
//! and backup-mirroring calls to peers. The replication plumbing (pushing writes to
//! the successor) lives with the ring state in `crate::chord`.

pub mod handlers;
pub mod memory;
pub mod protocol;
