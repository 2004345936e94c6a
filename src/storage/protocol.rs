//! Storage Network Protocol
//!
//! Endpoints and DTOs for the key/value calls between nodes: client-facing
//! Put/Get/Delete on the owner, and the backup-mirroring calls an owner makes on
//! its successor. All calls are JSON `POST`s.

use serde::{Deserialize, Serialize};

use super::memory::Entries;

// --- API Endpoints ---

/// Write a pair into the owner's primary store (and its successor's backup).
pub const ENDPOINT_PUT: &str = "/kv/put";
/// Read a key from the owner's primary store.
pub const ENDPOINT_GET: &str = "/kv/get";
/// Delete a key from the owner's primary store (and its successor's backup).
pub const ENDPOINT_DELETE: &str = "/kv/delete";
/// Mirror a single write into the backup store.
pub const ENDPOINT_PUT_ON_BACKUP: &str = "/backup/put";
/// Mirror a single delete into the backup store.
pub const ENDPOINT_DELETE_ON_BACKUP: &str = "/backup/delete";
/// Bulk merge into the backup store (after a failover promotion upstream).
pub const ENDPOINT_SEND_BACKUP: &str = "/backup/send";
/// Bulk prune of the backup store (after ownership moved to a new node).
pub const ENDPOINT_REMOVE_FROM_BACKUP: &str = "/backup/remove";

// --- Data Transfer Objects ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRequest {
    pub key: String,
}

/// `None` means the key is absent; the handler then answers `404`.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetResponse {
    pub value: Option<String>,
}

/// Reply to Delete: the removed value.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub value: Option<String>,
}

/// A batch of pairs for SendBackup / RemoveFromBackup.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EntriesPayload {
    pub entries: Entries,
}

/// Acknowledgment for calls without a meaningful reply.
#[derive(Debug, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
}
