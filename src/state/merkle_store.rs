/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`MerkleStore`] adapter that serves the tree out of the key-value engine, plus the
//! batched writes for a tree update.

use num_bigint::BigUint;

use crate::merkle::{MerkleStore, Position, UpdateResult};

use super::kv_store::{KVGet, WriteBatch};
use super::paths::{self, combine};

#[derive(Clone)]
pub(crate) struct MerkleKV<K> {
    kv: K,
}

impl<K: KVGet> MerkleKV<K> {
    pub(crate) fn new(kv: K) -> MerkleKV<K> {
        MerkleKV { kv }
    }

    /// Stage every node of `update` and the new tree metadata into `wb`. The caller writes
    /// the batch together with the state values the tree attests.
    pub(crate) fn commit_update<W: WriteBatch>(&self, wb: &mut W, update: &UpdateResult) {
        for node in update.leaves.iter().chain(update.branches.iter()) {
            wb.set(
                &combine(&paths::MERKLE_NODES, &node.position.bytes()),
                &node.data,
            );
        }
        wb.set(&paths::MERKLE_LEAF_COUNT, &update.leaf_count.to_bytes_be());
        wb.set(&paths::MERKLE_HEIGHT, &[update.height]);
    }
}

impl<K: KVGet> MerkleStore for MerkleKV<K> {
    fn get_node(&self, position: &Position) -> Option<Vec<u8>> {
        self.kv
            .get(&combine(&paths::MERKLE_NODES, &position.bytes()))
    }

    fn get_leaf_count(&self) -> BigUint {
        self.kv
            .get(&paths::MERKLE_LEAF_COUNT)
            .map(|bytes| BigUint::from_bytes_be(&bytes))
            .unwrap_or_default()
    }

    fn get_height(&self) -> u8 {
        self.kv
            .get(&paths::MERKLE_HEIGHT)
            .and_then(|bytes| bytes.first().copied())
            .unwrap_or(0)
    }
}
