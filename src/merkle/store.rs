/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Tree nodes, their positions, and the backing-store capability.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use num_bigint::BigUint;

use super::tree::UpdateResult;

/// The address of a node: its level and its index within that level.
///
/// Leaves sit at level 0 with indices `0..leaf_count`; the parent of `(level, i)` is
/// `(level + 1, i / branch_factor)`. Indices are unbounded unsigned integers because the
/// sparse tree can in principle outgrow 64 bits.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    level: u8,
    index: BigUint,
}

impl Position {
    pub fn new(level: u8, index: BigUint) -> Position {
        Position { level, index }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn index(&self) -> &BigUint {
        &self.index
    }

    /// The storage key suffix for this position: the level byte followed by the big-endian
    /// index bytes (`[0]` for index zero, so the suffix is never empty).
    pub fn bytes(&self) -> Vec<u8> {
        let mut bytes = vec![self.level];
        bytes.extend_from_slice(&self.index.to_bytes_be());
        bytes
    }
}

/// A tree node: a position and the hash data stored there.
///
/// Leaf data is the state-value hash; branch data is the hash over the concatenated data of
/// the node's present children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub position: Position,
    pub data: Vec<u8>,
}

impl Node {
    pub fn new(position: Position, data: Vec<u8>) -> Node {
        Node { position, data }
    }
}

/// Read access to persisted tree nodes and metadata.
///
/// `get_height` returns 0 for an empty tree; a populated tree's root sits at
/// `(height, 0)` with `height >= 1`.
pub trait MerkleStore {
    fn get_node(&self, position: &Position) -> Option<Vec<u8>>;

    fn get_leaf_count(&self) -> BigUint;

    fn get_height(&self) -> u8;
}

/// A volatile in-memory [`MerkleStore`]. Cheap to clone; clones share the same map.
#[derive(Clone, Default)]
pub struct MapStore(Arc<Mutex<MapStoreInner>>);

#[derive(Default)]
struct MapStoreInner {
    nodes: HashMap<Position, Vec<u8>>,
    leaf_count: BigUint,
    height: u8,
}

impl MapStore {
    pub fn new() -> MapStore {
        MapStore::default()
    }

    /// Persist every node of `update` and advance the tree metadata.
    pub fn commit_update(&self, update: &UpdateResult) {
        let mut inner = self.0.lock().unwrap();
        for node in update.leaves.iter().chain(update.branches.iter()) {
            inner.nodes.insert(node.position.clone(), node.data.clone());
        }
        inner.leaf_count = update.leaf_count.clone();
        inner.height = update.height;
    }

    /// How many nodes the store holds.
    pub fn node_count(&self) -> usize {
        self.0.lock().unwrap().nodes.len()
    }
}

impl MerkleStore for MapStore {
    fn get_node(&self, position: &Position) -> Option<Vec<u8>> {
        self.0.lock().unwrap().nodes.get(position).cloned()
    }

    fn get_leaf_count(&self) -> BigUint {
        self.0.lock().unwrap().leaf_count.clone()
    }

    fn get_height(&self) -> u8 {
        self.0.lock().unwrap().height
    }
}
