use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};

use crate::ring::{RingId, between};

/// Key/value pairs as they travel between nodes.
pub type Entries = HashMap<String, String>;

/// The node-local half of the replicated store.
#[derive(Default)]
pub struct ReplicatedStore {
    primary: RwLock<Entries>,
    backup: Mutex<Entries>,
}

impl ReplicatedStore {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Primary ---

    pub async fn put(&self, key: String, value: String) {
        self.primary.write().await.insert(key, value);
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.primary.read().await.get(key).cloned()
    }

    pub async fn remove(&self, key: &str) -> Option<String> {
        self.primary.write().await.remove(key)
    }

    /// Merges entries handed over by another node (join-time split).
    pub async fn absorb(&self, entries: Entries) {
        if entries.is_empty() {
            return;
        }
        self.primary.write().await.extend(entries);
    }

    /// Full copy of the primary map, used to seed a successor's backup.
    pub async fn snapshot(&self) -> Entries {
        self.primary.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.primary.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.primary.read().await.is_empty()
    }

    /// Removes and returns every key that no longer belongs in `(new_predecessor, own_id]`.
    ///
    /// Called on the successor of a joining node: everything outside the
    /// shrunken interval now belongs to the newcomer.
    pub async fn split_off(&self, new_predecessor: &RingId, own_id: &RingId) -> Entries {
        let mut primary = self.primary.write().await;
        let moved: Vec<String> = primary
            .keys()
            .filter(|key| !between(new_predecessor, &RingId::hash(key), own_id, true))
            .cloned()
            .collect();

        moved
            .into_iter()
            .filter_map(|key| primary.remove_entry(&key))
            .collect()
    }

    // --- Backup ---

    pub async fn put_backup(&self, key: String, value: String) {
        self.backup.lock().await.insert(key, value);
    }

    pub async fn remove_backup(&self, key: &str) -> Option<String> {
        self.backup.lock().await.remove(key)
    }

    pub async fn merge_backup(&self, entries: Entries) {
        self.backup.lock().await.extend(entries);
    }

    pub async fn prune_backup<'a>(&self, keys: impl IntoIterator<Item = &'a String>) {
        let mut backup = self.backup.lock().await;
        for key in keys {
            backup.remove(key);
        }
    }

    /// Replaces the whole backup, e.g. after a new predecessor was accepted.
    pub async fn replace_backup(&self, entries: Entries) {
        *self.backup.lock().await = entries;
    }

    pub async fn backup_snapshot(&self) -> Entries {
        self.backup.lock().await.clone()
    }

    /// Failover promotion: moves every backup entry into the primary map.
    ///
    /// Holds both locks for the duration of the merge, so concurrent Put/Delete
    /// and backup mirroring observe either the state before or after it.
    /// Returns the promoted entries.
    pub async fn promote_backup(&self) -> Entries {
        let mut backup = self.backup.lock().await;
        let mut primary = self.primary.write().await;

        let promoted = std::mem::take(&mut *backup);
        for (key, value) in &promoted {
            primary.insert(key.clone(), value.clone());
        }

        promoted
    }

    pub async fn clear(&self) {
        self.backup.lock().await.clear();
        self.primary.write().await.clear();
    }
}
