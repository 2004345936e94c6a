//! Replicated Store operations that need the ring: owner-side writes mirrored
//! to the successor's backup, client-facing lookups, and failover promotion.

use super::node::ChordNode;
use crate::error::{ChordError, Result};
use crate::ring::RingId;
use crate::storage::memory::Entries;

impl ChordNode {
    // --- Owner side ---

    /// Stores a pair this node owns and mirrors it to the successor's backup.
    pub async fn put(&self, key: String, value: String) -> Result<()> {
        if let Some(successor) = self.backup_target().await {
            self.rpc.put_on_backup(&successor, &key, &value).await?;
        }
        self.store.put(key, value).await;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.store.get(key).await
    }

    /// Removes a key this node owns, and its mirror on the successor.
    ///
    /// Returns the removed value, or `ChordError::NotFound`.
    pub async fn delete(&self, key: &str) -> Result<String> {
        if let Some(successor) = self.backup_target().await {
            match self.rpc.delete_on_backup(&successor, key).await {
                Ok(()) | Err(ChordError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        self.store
            .remove(key)
            .await
            .ok_or_else(|| ChordError::NotFound(key.to_string()))
    }

    /// The node whose backup mirrors this node's primary store, unless that is
    /// this node itself.
    async fn backup_target(&self) -> Option<String> {
        match self.first_valid_successor().await {
            Ok(successor) if !self.is_self(&successor) => Some(successor),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("{} writes without a backup: {}", self.address(), e);
                None
            }
        }
    }

    // --- Backup side ---

    pub async fn put_on_backup(&self, key: String, value: String) {
        self.store.put_backup(key, value).await;
    }

    pub async fn delete_on_backup(&self, key: &str) -> Result<()> {
        self.store
            .remove_backup(key)
            .await
            .map(|_| ())
            .ok_or_else(|| ChordError::NotFound(key.to_string()))
    }

    pub async fn send_backup(&self, entries: Entries) {
        tracing::debug!("{} merges {} entries into its backup", self.address(), entries.len());
        self.store.merge_backup(entries).await;
    }

    pub async fn remove_from_backup(&self, entries: &Entries) {
        self.store.prune_backup(entries.keys()).await;
    }

    // --- Client side ---

    pub async fn put_on_chord(&self, key: &str, value: &str) -> Result<()> {
        let owner = self.find_successor(&RingId::hash(key), 0).await?;
        tracing::trace!("Put {} at owner {}", key, owner);

        if self.is_self(&owner) {
            self.put(key.to_string(), value.to_string()).await
        } else {
            self.rpc.put(&owner, key, value).await
        }
    }

    pub async fn get_on_chord(&self, key: &str) -> Result<Option<String>> {
        let owner = self.find_successor(&RingId::hash(key), 0).await?;
        tracing::trace!("Get {} from owner {}", key, owner);

        if self.is_self(&owner) {
            Ok(self.get(key).await)
        } else {
            self.rpc.get(&owner, key).await
        }
    }

    pub async fn delete_on_chord(&self, key: &str) -> Result<String> {
        let owner = self.find_successor(&RingId::hash(key), 0).await?;
        tracing::trace!("Delete {} at owner {}", key, owner);

        if self.is_self(&owner) {
            self.delete(key).await
        } else {
            self.rpc.delete(&owner, key).await
        }
    }

    // --- Failover ---

    /// Promotes the dead predecessor's replica into the primary store and
    /// re-establishes replication one hop down.
    ///
    /// The successor is resolved before the store locks are taken; the
    /// promoted set is forwarded once they are released.
    pub async fn enable_backup(&self) {
        let successor = self.first_valid_successor().await.ok();
        let promoted = self.store.promote_backup().await;

        tracing::info!(
            "{} promoted {} backup entries to primary",
            self.address(),
            promoted.len()
        );
        if promoted.is_empty() {
            return;
        }

        match successor {
            Some(successor) if !self.is_self(&successor) => {
                if let Err(e) = self.rpc.send_backup(&successor, &promoted).await {
                    tracing::error!(
                        "{} could not forward promoted entries to {}: {}",
                        self.address(),
                        successor,
                        e
                    );
                }
            }
            _ => tracing::debug!("{} has no successor to replicate promoted entries to", self.address()),
        }
    }
}
