/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Byte prefixes that lay out the logical column families inside the single key-value
//! engine.
//!
//! Mappings store each entry at `prefix ∥ entry key`; single values live directly at their
//! one-byte prefix. The families:
//!
//! - [`BLOCKS`]: block hash → Borsh-encoded block.
//! - [`BLOCK_AT_HEIGHT`]: big-endian height → block hash.
//! - [`BLOCK_HEIGHT`]: the committed chain height (single value, big-endian `u64`). This is
//!   the recovery anchor: on open, any derived data above it is treated as suspect and is
//!   overwritten when the next commit re-executes that height.
//! - [`LAST_QC`]: the certificate for the committed head (single value).
//! - [`TXS`], [`TX_COMMITS`], [`BLOCK_COMMITS`]: transaction hash (or block hash) → record.
//! - [`STATE`]: state key → value bytes.
//! - [`STATE_TREE_INDEX`]: state key → big-endian Merkle leaf index.
//! - [`MERKLE_NODES`]: node position → node data; [`MERKLE_LEAF_COUNT`] and
//!   [`MERKLE_HEIGHT`] are the tree metadata (single values).

pub const BLOCKS: [u8; 1] = [0];
pub const BLOCK_AT_HEIGHT: [u8; 1] = [1];
pub const BLOCK_HEIGHT: [u8; 1] = [2];
pub const LAST_QC: [u8; 1] = [3];
pub const TXS: [u8; 1] = [4];
pub const TX_COMMITS: [u8; 1] = [5];
pub const BLOCK_COMMITS: [u8; 1] = [6];
pub const STATE: [u8; 1] = [7];
pub const STATE_TREE_INDEX: [u8; 1] = [8];
pub const MERKLE_NODES: [u8; 1] = [9];
pub const MERKLE_LEAF_COUNT: [u8; 1] = [10];
pub const MERKLE_HEIGHT: [u8; 1] = [11];

/// Concatenate two byteslices into one vector.
pub fn combine(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut res = Vec::with_capacity(a.len() + b.len());
    res.extend_from_slice(a);
    res.extend_from_slice(b);
    res
}
