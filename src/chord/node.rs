use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock};

use super::types::{FingerTable, NodeSnapshot, SuccessorList};
use crate::config::NodeConfig;
use crate::error::{ChordError, Result};
use crate::ring::RingId;
use crate::rpc::{RpcClient, validate_address};
use crate::storage::memory::{Entries, ReplicatedStore};

/// Split requests a joining node makes before rolling back.
const SPLIT_ATTEMPTS: usize = 3;

/// One member of the ring.
///
/// Owns the ring pointers (successor list, predecessor, finger table) and the
/// local stores. Inbound handlers and the three maintenance loops share it
/// through an `Arc`; each piece of state has its own lock.
pub struct ChordNode {
    address: String,
    id: RingId,
    pub(super) config: NodeConfig,
    listening: AtomicBool,
    pub(crate) store: ReplicatedStore,
    pub(super) successors: RwLock<SuccessorList>,
    pub(super) predecessor: RwLock<Option<String>>,
    pub(super) fingers: Mutex<FingerTable>,
    pub(super) rpc: RpcClient,
}

impl ChordNode {
    /// Creates an unbound node whose identifier is the hash of `address`.
    pub fn new(address: impl Into<String>, config: NodeConfig) -> Result<Arc<Self>> {
        let address = address.into();
        validate_address(&address)?;

        Ok(Arc::new(Self {
            id: RingId::hash(&address),
            rpc: RpcClient::new(&config),
            address,
            config,
            listening: AtomicBool::new(false),
            store: ReplicatedStore::new(),
            successors: RwLock::new(SuccessorList::default()),
            predecessor: RwLock::new(None),
            fingers: Mutex::new(FingerTable::default()),
        }))
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn id(&self) -> &RingId {
        &self.id
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    pub fn set_listening(&self, listening: bool) {
        self.listening.store(listening, Ordering::SeqCst);
    }

    pub(super) fn is_self(&self, address: &str) -> bool {
        address == self.address
    }

    /// Liveness of a peer; the node itself is alive while it listens.
    pub(super) async fn is_alive(&self, address: &str) -> bool {
        if self.is_self(address) {
            return self.is_listening();
        }
        self.rpc.check_liveness(address).await
    }

    /// Starts a ring of one.
    pub async fn create(&self) {
        *self.predecessor.write().await = None;
        *self.successors.write().await = SuccessorList::solo(&self.address);
        tracing::info!("{} created a new ring (id {})", self.address, self.id);
    }

    /// Enters the ring `bootstrap` belongs to.
    ///
    /// Locates this node's successor, copies its successor list, and pulls the
    /// keys this node now owns. On failure after the successor was adopted the
    /// node falls back to a ring of one.
    pub async fn join(&self, bootstrap: &str) -> Result<()> {
        validate_address(bootstrap)?;
        if self.is_self(bootstrap) {
            return Err(ChordError::InvalidAddress(bootstrap.to_string()));
        }

        tracing::debug!("{} joining via {}", self.address, bootstrap);
        *self.predecessor.write().await = None;

        let successor = self.rpc.find_successor(bootstrap, &self.id, 0).await?;
        if self.is_self(&successor) {
            return Err(ChordError::Routing(format!(
                "ring still routes {} to itself",
                self.address
            )));
        }
        tracing::debug!("Successor of {} is {}", self.address, successor);

        let tail = self.rpc.get_successors(&successor).await?;
        self.successors
            .write()
            .await
            .adopt(successor.clone(), &tail);

        match self.request_split(&successor).await {
            Ok(entries) => {
                tracing::info!(
                    "{} joined the ring before {} and took over {} keys",
                    self.address,
                    successor,
                    entries.len()
                );
                self.store.absorb(entries).await;
                Ok(())
            }
            Err(e) => {
                *self.successors.write().await = SuccessorList::solo(&self.address);
                Err(e)
            }
        }
    }

    /// Asks `successor` for the keys this node now owns.
    ///
    /// The split is repeatable for the same newcomer, so a reply lost to a
    /// timeout is recovered by asking again rather than by giving up on keys
    /// the successor may already have handed over.
    async fn request_split(&self, successor: &str) -> Result<Entries> {
        let mut attempt = 1;
        loop {
            match self.rpc.split_into_predecessor(successor, &self.address).await {
                Ok(entries) => return Ok(entries),
                Err(e) if e.is_retryable() && attempt < SPLIT_ATTEMPTS => {
                    tracing::warn!(
                        "Split request {} from {} to {} failed: {}",
                        attempt,
                        self.address,
                        successor,
                        e
                    );
                    attempt += 1;
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn successor_list(&self) -> Vec<String> {
        self.successors.read().await.to_vec()
    }

    pub async fn predecessor(&self) -> Option<String> {
        self.predecessor.read().await.clone()
    }

    /// Called on the successor of a joining node: records the newcomer as
    /// predecessor and hands over every key it now owns.
    ///
    /// The moved keys become this node's backup (it now mirrors the
    /// newcomer). Asking again for the same newcomer returns everything
    /// handed over so far. Pruning the moved keys from this node's
    /// successor's backup runs detached, after the hand-over is recorded.
    pub async fn split_into_predecessor(&self, new_node: &str) -> Result<Entries> {
        validate_address(new_node)?;
        let new_id = RingId::hash(new_node);

        let previous = self
            .predecessor
            .write()
            .await
            .replace(new_node.to_string());
        let moved = self.store.split_off(&new_id, &self.id).await;

        let handover = if previous.as_deref() == Some(new_node) {
            let mut handover = self.store.backup_snapshot().await;
            handover.extend(moved.clone());
            handover
        } else {
            moved.clone()
        };
        self.store.replace_backup(handover.clone()).await;

        tracing::info!(
            "Predecessor of {} changed from {:?} to {} (join), handing over {} keys",
            self.address,
            previous,
            new_node,
            handover.len()
        );

        let successor = self.successors.read().await.first().map(str::to_string);
        if let Some(successor) = successor
            && !self.is_self(&successor)
            && !moved.is_empty()
        {
            let rpc = self.rpc.clone();
            tokio::spawn(async move {
                if let Err(e) = rpc.remove_from_backup(&successor, &moved).await {
                    tracing::warn!(
                        "Failed to prune moved keys from backup on {}: {}",
                        successor,
                        e
                    );
                }
            });
        }

        Ok(handover)
    }

    /// Full copy of the primary store.
    pub async fn receive_data(&self) -> Entries {
        self.store.snapshot().await
    }

    /// Drops all ring and store state.
    pub async fn clear(&self) {
        self.store.clear().await;
        *self.successors.write().await = SuccessorList::default();
        *self.predecessor.write().await = None;
        *self.fingers.lock().await = FingerTable::default();
    }

    pub async fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            address: self.address.clone(),
            id: self.id,
            listening: self.is_listening(),
            predecessor: self.predecessor().await,
            successors: self.successor_list().await,
            data: self.store.snapshot().await.into_iter().collect(),
            backup: self.store.backup_snapshot().await.into_iter().collect(),
        }
    }
}
