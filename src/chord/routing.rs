//! Routing Engine
//!
//! Lookups are forwarded hop by hop: each node either answers with its first
//! live successor or hands the lookup to the closest finger that still
//! precedes the key. Fingers only shorten the path; a lookup that ignores them
//! entirely still terminates by walking successors.

use super::node::ChordNode;
use crate::error::{ChordError, Result};
use crate::ring::{RingId, between};

impl ChordNode {
    /// Address of the node owning `id`.
    ///
    /// `hops` is the number of forwards taken so far; the lookup fails with
    /// `ChordError::Routing` once it exceeds the configured budget.
    pub async fn find_successor(&self, id: &RingId, hops: usize) -> Result<String> {
        let successor = self.first_valid_successor().await?;
        if between(self.id(), id, &RingId::hash(&successor), true) {
            return Ok(successor);
        }

        if hops >= self.config.lookup_hops {
            return Err(ChordError::Routing(format!(
                "lookup of {} exceeded {} hops at {}",
                id,
                hops,
                self.address()
            )));
        }

        let next = self.closest_preceding_node(id).await?;
        if self.is_self(&next) {
            return Ok(successor);
        }

        tracing::trace!("{} forwards lookup of {:?} to {}", self.address(), id, next);
        self.rpc.find_successor(&next, id, hops + 1).await
    }

    /// The live finger closest to (but strictly before) `id`, falling back to
    /// the first live successor.
    pub async fn closest_preceding_node(&self, id: &RingId) -> Result<String> {
        let candidates: Vec<String> = {
            let fingers = self.fingers.lock().await;
            fingers
                .iter_rev()
                .filter(|finger| between(self.id(), &RingId::hash(finger), id, false))
                .map(str::to_string)
                .collect()
        };

        let mut dead: Vec<String> = Vec::new();
        for candidate in candidates {
            if dead.contains(&candidate) {
                continue;
            }
            if self.is_alive(&candidate).await {
                return Ok(candidate);
            }
            dead.push(candidate);
        }

        self.first_valid_successor().await
    }

    /// First entry of the successor list that answers a liveness probe.
    ///
    /// Failing here means every known successor is gone: the ring has
    /// fragmented around this node.
    pub async fn first_valid_successor(&self) -> Result<String> {
        let successors = self.successor_list().await;

        let mut dead: Vec<&String> = Vec::new();
        for successor in &successors {
            if dead.contains(&successor) {
                continue;
            }
            if self.is_alive(successor).await {
                return Ok(successor.clone());
            }
            dead.push(successor);
        }

        Err(ChordError::Routing(format!(
            "no live successor for {} among {:?}",
            self.address(),
            successors
        )))
    }

    /// Refreshes the finger under the rotating cursor, then advances it.
    pub async fn fix_fingers(&self) {
        let slot = self.fingers.lock().await.advance();
        let target = self.id().add_pow2(slot);

        match self.find_successor(&target, 0).await {
            Ok(address) => {
                let mut fingers = self.fingers.lock().await;
                if fingers.get(slot) != Some(address.as_str()) {
                    tracing::trace!("{} finger {} -> {}", self.address(), slot, address);
                    fingers.set(slot, address);
                }
            }
            Err(e) => tracing::error!("FixFingers at {} (slot {}): {}", self.address(), slot, e),
        }
    }
}
