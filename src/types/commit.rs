/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Records produced when a block is executed and committed.

use borsh::{BorshDeserialize, BorshSerialize};

use super::basic::CryptoHash;

/// A single key's change within a committed block.
///
/// The executor fills `key` and `value`; the storage layer resolves `prev_value` and the
/// Merkle leaf indices while preparing the commit. `tree_index` and `prev_tree_index` are
/// big-endian bytes of an unbounded unsigned integer, the leaf position assigned to the
/// key when it was first written.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct StateChange {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub prev_value: Option<Vec<u8>>,
    pub tree_index: Option<Vec<u8>>,
    pub prev_tree_index: Option<Vec<u8>>,
}

impl StateChange {
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> StateChange {
        StateChange {
            key,
            value,
            prev_value: None,
            tree_index: None,
            prev_tree_index: None,
        }
    }
}

/// The execution record of one committed block.
///
/// `old_block_txs` lists transactions that already carried a commit record when this block
/// committed (re-proposed after a leader change) and were therefore skipped. `leaf_count`
/// and `merkle_root` capture the state tree after applying `state_changes`; both are set by
/// the storage layer.
#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct BlockCommit {
    pub block_hash: CryptoHash,
    pub state_changes: Vec<StateChange>,
    pub elapsed_exec: f64,
    pub elapsed_merkle: f64,
    pub old_block_txs: Vec<CryptoHash>,
    pub leaf_count: Vec<u8>,
    pub merkle_root: Vec<u8>,
}

impl BlockCommit {
    pub fn new(block_hash: CryptoHash) -> BlockCommit {
        BlockCommit {
            block_hash,
            state_changes: Vec::new(),
            elapsed_exec: 0.0,
            elapsed_merkle: 0.0,
            old_block_txs: Vec::new(),
            leaf_count: Vec::new(),
            merkle_root: Vec::new(),
        }
    }
}

/// The commit record of one transaction: where it landed and whether it failed.
///
/// `error` is empty for successful transactions. `elapsed` is the execution time in
/// seconds.
#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct TxCommit {
    pub hash: CryptoHash,
    pub block_hash: CryptoHash,
    pub block_height: u64,
    pub elapsed: f64,
    pub error: String,
}
