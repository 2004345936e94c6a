//! Ring Network Protocol
//!
//! Endpoints and DTOs for the ring-maintenance calls between nodes: routing
//! lookups, pointer reads, predecessor notification and the join-time data
//! hand-over. All calls are JSON `POST`s; calls without arguments send `null`.

use serde::{Deserialize, Serialize};

use crate::ring::RingId;
use crate::storage::memory::Entries;

// --- API Endpoints ---

/// Routing lookup; may be forwarded to further nodes.
pub const ENDPOINT_FIND_SUCCESSOR: &str = "/chord/find_successor";
/// Read the current successor list.
pub const ENDPOINT_GET_SUCCESSORS: &str = "/chord/successors";
/// Read the current predecessor (may be unknown).
pub const ENDPOINT_GET_PREDECESSOR: &str = "/chord/predecessor";
/// Offer the caller as a predecessor candidate.
pub const ENDPOINT_NOTIFY: &str = "/chord/notify";
/// Hand the keys a joining node now owns over to it.
pub const ENDPOINT_SPLIT: &str = "/chord/split";
/// Fetch a full copy of the primary store (seeds the caller's backup).
pub const ENDPOINT_RECEIVE_DATA: &str = "/chord/receive_data";

// --- Data Transfer Objects ---

/// Lookup of the node owning `id`. `hops` counts forwards taken so far.
#[derive(Debug, Serialize, Deserialize)]
pub struct FindSuccessorRequest {
    pub id: RingId,
    pub hops: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddressResponse {
    /// `None` when the lookup failed on the remote side.
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessorListResponse {
    pub successors: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredecessorResponse {
    pub predecessor: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotifyRequest {
    pub candidate: String,
}

/// Sent by a joining node to its successor.
#[derive(Debug, Serialize, Deserialize)]
pub struct SplitRequest {
    pub address: String,
}

/// Bulk key/value reply for Split and ReceiveData.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DataResponse {
    pub entries: Entries,
}
