/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Reads and batched writes for the world state, and the translation of state changes into
//! Merkle leaves.

use num_bigint::BigUint;
use sha3::{Digest, Sha3_256};

use crate::merkle::{Node, Position};
use crate::types::commit::StateChange;

use super::kv_store::{KVGet, WriteBatch};
use super::paths::{self, combine};

pub(crate) struct StateStore<K> {
    kv: K,
}

impl<K: KVGet> StateStore<K> {
    pub(crate) fn new(kv: K) -> StateStore<K> {
        StateStore { kv }
    }

    pub(crate) fn get_state(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.kv.get(&combine(&paths::STATE, key))
    }

    pub(crate) fn get_tree_index(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.kv.get(&combine(&paths::STATE_TREE_INDEX, key))
    }

    /// The leaf data for a state value.
    pub(crate) fn sum_state_value(value: &[u8]) -> Vec<u8> {
        Sha3_256::digest(value).to_vec()
    }

    pub(crate) fn load_prev_values(&self, changes: &mut [StateChange]) {
        for change in changes.iter_mut() {
            change.prev_value = self.get_state(&change.key);
        }
    }

    pub(crate) fn load_prev_tree_indexes(&self, changes: &mut [StateChange]) {
        for change in changes.iter_mut() {
            change.prev_tree_index = self.get_tree_index(&change.key);
        }
    }

    /// Assign leaf positions: keys seen before keep their index, new keys take the next
    /// free slots starting at `prev_leaf_count`. Returns the leaf count after allocation.
    pub(crate) fn set_new_tree_indexes(
        &self,
        changes: &mut [StateChange],
        prev_leaf_count: BigUint,
    ) -> BigUint {
        let mut leaf_count = prev_leaf_count;
        for change in changes.iter_mut() {
            match &change.prev_tree_index {
                Some(index) => change.tree_index = Some(index.clone()),
                None => {
                    change.tree_index = Some(leaf_count.to_bytes_be());
                    leaf_count += 1u8;
                }
            }
        }
        leaf_count
    }

    /// The dirty leaves for the tree update, one per state change.
    ///
    /// Requires tree indexes to have been assigned.
    pub(crate) fn compute_leaf_nodes(&self, changes: &[StateChange]) -> Vec<Node> {
        changes
            .iter()
            .map(|change| {
                let index = change
                    .tree_index
                    .as_deref()
                    .map(BigUint::from_bytes_be)
                    .unwrap_or_default();
                Node::new(
                    Position::new(0, index),
                    Self::sum_state_value(&change.value),
                )
            })
            .collect()
    }

    pub(crate) fn commit_state_changes<W: WriteBatch>(&self, wb: &mut W, changes: &[StateChange]) {
        for change in changes {
            wb.set(&combine(&paths::STATE, &change.key), &change.value);
            if let Some(index) = &change.tree_index {
                wb.set(&combine(&paths::STATE_TREE_INDEX, &change.key), index);
            }
        }
    }
}
