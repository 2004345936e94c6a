//! Ring Maintenance
//!
//! Three independent loops keep the ring pointers converging after joins and
//! failures: Stabilize (successor side), CheckPredecessor (predecessor side,
//! triggers failover), and FixFingers (routing hints). Each does one step, then
//! sleeps one maintenance period, for as long as the node is listening. A failed
//! step is logged and never stops its loop.
//!
//! Notify policy: a node notifies the successor it adopted in the same
//! Stabilize round, and a notified node pulls the candidate's data into its
//! backup only when the predecessor actually changes.

use std::sync::Arc;
use tokio::task::JoinHandle;

use super::node::ChordNode;
use crate::error::Result;
use crate::ring::{RingId, between};
use crate::rpc::validate_address;

impl ChordNode {
    /// Spawns the three maintenance loops.
    pub fn start_maintenance(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        tracing::info!("Starting maintenance loops at {}", self.address());

        let stabilize_handle = {
            let node = self.clone();
            tokio::spawn(async move {
                node.stabilize_loop().await;
            })
        };

        let check_predecessor_handle = {
            let node = self.clone();
            tokio::spawn(async move {
                node.check_predecessor_loop().await;
            })
        };

        let fix_fingers_handle = {
            let node = self.clone();
            tokio::spawn(async move {
                node.fix_fingers_loop().await;
            })
        };

        vec![stabilize_handle, check_predecessor_handle, fix_fingers_handle]
    }

    async fn stabilize_loop(self: Arc<Self>) {
        while self.is_listening() {
            if let Err(e) = self.stabilize().await {
                tracing::error!("Stabilize at {}: {}", self.address(), e);
            }
            tokio::time::sleep(self.config.maintain_period).await;
        }
        tracing::debug!("Stabilize loop at {} stopped", self.address());
    }

    async fn check_predecessor_loop(self: Arc<Self>) {
        while self.is_listening() {
            self.check_predecessor().await;
            tokio::time::sleep(self.config.maintain_period).await;
        }
        tracing::debug!("CheckPredecessor loop at {} stopped", self.address());
    }

    async fn fix_fingers_loop(self: Arc<Self>) {
        while self.is_listening() {
            self.fix_fingers().await;
            tokio::time::sleep(self.config.maintain_period).await;
        }
        tracing::debug!("FixFingers loop at {} stopped", self.address());
    }

    /// One stabilization round.
    ///
    /// Asks the first live successor for its predecessor and adopts that node
    /// if it sits between us and the successor; then refreshes the successor
    /// list from the chosen successor and notifies it. Remote state is gathered
    /// without locks; if the list changed meanwhile the round is dropped.
    pub async fn stabilize(&self) -> Result<()> {
        let before = self.successors.read().await.clone();
        let successor = self.first_valid_successor().await?;

        let mut next = successor.clone();
        match self.predecessor_of(&successor).await {
            Ok(Some(candidate)) => {
                let inserted = !self.is_self(&candidate)
                    && between(
                        self.id(),
                        &RingId::hash(&candidate),
                        &RingId::hash(&successor),
                        false,
                    );
                if inserted && self.is_alive(&candidate).await {
                    next = candidate;
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    "Stabilize at {}: cannot read predecessor of {}: {}",
                    self.address(),
                    successor,
                    e
                );
            }
        }

        let tail = self.successors_of(&next).await?;

        let mut successors = self.successors.write().await;
        if *successors != before {
            tracing::debug!(
                "Successor list of {} changed during stabilization, retrying next period",
                self.address()
            );
            return Ok(());
        }

        if successors.first() != Some(next.as_str()) {
            tracing::info!(
                "Successor of {} changed from {:?} to {}",
                self.address(),
                successors.first(),
                next
            );
        }
        successors.adopt(next.clone(), &tail);

        if let Err(e) = self.notify_peer(&next).await {
            tracing::error!("Stabilize at {}: notify {} failed: {}", self.address(), next, e);
        }

        Ok(())
    }

    /// Inbound predecessor candidate.
    ///
    /// Accepted when no predecessor is known or the candidate lies strictly
    /// between the current predecessor and this node. The candidate's primary
    /// data is fetched first; the predecessor and the reseeded backup are then
    /// installed together, and only if the candidate is still acceptable. A
    /// failed fetch leaves both untouched, so the next Notify tries again.
    pub async fn notify(&self, candidate: &str) -> Result<()> {
        validate_address(candidate)?;

        if !accepts(self.predecessor.read().await.as_deref(), candidate, self.id()) {
            return Ok(());
        }

        let data = if self.is_self(candidate) {
            self.receive_data().await
        } else {
            self.rpc.receive_data(candidate).await?
        };

        let mut predecessor = self.predecessor.write().await;
        if !accepts(predecessor.as_deref(), candidate, self.id()) {
            tracing::debug!(
                "{} dropped stale candidate {}, predecessor is now {:?}",
                self.address(),
                candidate,
                predecessor
            );
            return Ok(());
        }

        let previous = predecessor.replace(candidate.to_string());
        self.store.replace_backup(data).await;
        drop(predecessor);

        tracing::info!(
            "Predecessor of {} changed from {:?} to {}",
            self.address(),
            previous,
            candidate
        );
        Ok(())
    }

    /// Declares a silent predecessor dead: promotes its replica and forgets it,
    /// so the next Notify can install a replacement.
    pub async fn check_predecessor(&self) {
        let Some(predecessor) = self.predecessor().await else {
            return;
        };
        if self.is_self(&predecessor) || self.rpc.check_liveness(&predecessor).await {
            return;
        }

        tracing::warn!(
            "Node {}, predecessor of {}, has failed",
            predecessor,
            self.address()
        );
        self.enable_backup().await;

        let mut current = self.predecessor.write().await;
        if current.as_deref() == Some(predecessor.as_str()) {
            *current = None;
        }
    }

    async fn predecessor_of(&self, address: &str) -> Result<Option<String>> {
        if self.is_self(address) {
            return Ok(self.predecessor().await);
        }
        self.rpc.get_predecessor(address).await
    }

    async fn successors_of(&self, address: &str) -> Result<Vec<String>> {
        if self.is_self(address) {
            return Ok(self.successor_list().await);
        }
        self.rpc.get_successors(address).await
    }

    async fn notify_peer(&self, address: &str) -> Result<()> {
        if self.is_self(address) {
            return self.notify(address).await;
        }
        self.rpc.notify(address, self.address()).await
    }
}

/// Whether `candidate` should replace `current` as the predecessor of `own_id`.
fn accepts(current: Option<&str>, candidate: &str, own_id: &RingId) -> bool {
    match current {
        None => true,
        Some(current) if current == candidate => false,
        Some(current) => between(&RingId::hash(current), &RingId::hash(candidate), own_id, false),
    }
}
