use serde::Serialize;
use std::collections::BTreeMap;

use crate::ring::{ID_BITS, RingId};

/// Number of successors each node tracks.
pub const SUCCESSOR_LEN: usize = 5;
/// One finger per bit of the identifier space.
pub const FINGER_LEN: usize = ID_BITS;

/// The next `SUCCESSOR_LEN` nodes clockwise; index 0 is the immediate successor.
///
/// Slots past the known part of the ring stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuccessorList {
    entries: [Option<String>; SUCCESSOR_LEN],
}

impl SuccessorList {
    /// A ring of one: the node is its own successor.
    pub fn solo(address: &str) -> Self {
        let mut list = Self::default();
        list.entries[0] = Some(address.to_string());
        list
    }

    pub fn first(&self) -> Option<&str> {
        self.entries[0].as_deref()
    }

    /// Known successors in ring order, skipping empty slots.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|entry| entry.as_deref())
    }

    pub fn contains(&self, address: &str) -> bool {
        self.iter().any(|entry| entry == address)
    }

    /// Installs `head` as the immediate successor followed by `head`'s own list,
    /// shifted by one (its last entry falls off).
    pub fn adopt(&mut self, head: String, tail: &[String]) {
        self.entries[0] = Some(head);
        for i in 1..SUCCESSOR_LEN {
            self.entries[i] = tail.get(i - 1).filter(|addr| !addr.is_empty()).cloned();
        }
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.iter().map(str::to_string).collect()
    }
}

/// Routing hints: entry `i` approximates the successor of `(id + 2^i) mod 2^160`.
///
/// Refreshed one slot per maintenance tick on a rotating cursor.
#[derive(Debug, Clone)]
pub struct FingerTable {
    entries: [Option<String>; FINGER_LEN],
    cursor: usize,
}

impl Default for FingerTable {
    fn default() -> Self {
        Self {
            entries: std::array::from_fn(|_| None),
            cursor: 0,
        }
    }
}

impl FingerTable {
    /// Returns the slot to refresh now and moves the cursor on.
    pub fn advance(&mut self) -> usize {
        let slot = self.cursor;
        self.cursor = (self.cursor + 1) % FINGER_LEN;
        slot
    }

    pub fn set(&mut self, slot: usize, address: String) {
        self.entries[slot] = Some(address);
    }

    pub fn get(&self, slot: usize) -> Option<&str> {
        self.entries.get(slot).and_then(|entry| entry.as_deref())
    }

    /// Filled slots from the longest jump down to the shortest.
    pub fn iter_rev(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().rev().filter_map(|entry| entry.as_deref())
    }

    pub fn filled(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }
}

/// Point-in-time view of a node, for diagnostics, dumps and tests.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    pub address: String,
    pub id: RingId,
    pub listening: bool,
    pub predecessor: Option<String>,
    pub successors: Vec<String>,
    pub data: BTreeMap<String, String>,
    pub backup: BTreeMap<String, String>,
}

impl NodeSnapshot {
    /// Whether `key` falls in this node's `(predecessor, self]` interval.
    pub fn owns(&self, key: &str) -> bool {
        match &self.predecessor {
            Some(pred) => crate::ring::between(
                &RingId::hash(pred),
                &RingId::hash(key),
                &self.id,
                true,
            ),
            None => false,
        }
    }
}
