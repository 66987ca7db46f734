/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The storage façade: the atomic commit protocol and verified state reads.

use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use std::sync::RwLock;
use std::time::Instant;

use num_bigint::BigUint;
use sha3::Sha3_256;

use crate::logging::short_hash;
use crate::merkle::{MerkleStore, Node, Position, Tree, UpdateResult};
use crate::types::basic::CryptoHash;
use crate::types::block::Block;
use crate::types::commit::{BlockCommit, TxCommit};
use crate::types::quorum_cert::QuorumCert;
use crate::types::transaction::Transaction;

use super::chain_store::ChainStore;
use super::kv_store::{KVStore, StoreError, WriteBatch};
use super::merkle_store::MerkleKV;
use super::state_store::StateStore;

/// Everything persisted when a block commits.
///
/// `qc` is the certificate proving a quorum behind the committed block; it becomes the
/// stored `last_qc` so a restarting replica can resume proposing from the committed head.
pub struct CommitData {
    pub block: Block,
    pub qc: QuorumCert,
    pub transactions: Vec<Transaction>,
    pub block_commit: BlockCommit,
    pub tx_commits: Vec<TxCommit>,
}

#[derive(Clone, Copy)]
pub struct StorageConfig {
    pub merkle_branch_factor: u8,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            merkle_branch_factor: 8,
        }
    }
}

/// Chain, state, and Merkle tree in one engine.
///
/// # Commit protocol
///
/// [`commit`](Self::commit) writes in five steps, each an atomic batch:
/// 1. compute the Merkle update in memory (touches no storage),
/// 2. chain data (block, block-by-height, last qc, transactions, tx commits),
/// 3. the block commit record,
/// 4. state values + tree nodes + tree metadata, under the exclusive state lock,
/// 5. the committed block height.
///
/// A failure at step `k` leaves the store with data from a block above the recorded
/// `block_height`. That height is the source of truth on reopen: derived data above it is
/// ignored and overwritten when the height is re-committed.
pub struct Storage<K: KVStore> {
    kv: K,
    chain: ChainStore<K>,
    state: StateStore<K>,
    merkle_kv: MerkleKV<K>,
    tree: Tree<MerkleKV<K>, Sha3_256>,

    // Guards the state+merkle section: step 4 takes it exclusively, verified reads share it.
    state_lock: RwLock<()>,
}

impl<K: KVStore> Storage<K> {
    pub fn new(kv: K, config: StorageConfig) -> Storage<K> {
        let merkle_kv = MerkleKV::new(kv.clone());
        let tree = Tree::new(merkle_kv.clone(), config.merkle_branch_factor);
        Storage {
            chain: ChainStore::new(kv.clone()),
            state: StateStore::new(kv.clone()),
            merkle_kv,
            tree,
            kv,
            state_lock: RwLock::new(()),
        }
    }

    /// Whether the store has ever committed a block (the genesis block included).
    pub fn is_initialized(&self) -> bool {
        self.chain.has_block_height()
    }

    /// Seed a fresh store with the genesis block. Rejected once any height is committed.
    pub fn commit_genesis(&self, genesis: &Block) -> Result<(), StorageError> {
        if self.is_initialized() {
            return Err(StorageError::AlreadyInitialized);
        }
        let mut wb = K::WriteBatch::new();
        self.chain.set_block(&mut wb, genesis)?;
        self.chain.set_last_qc(&mut wb, &genesis.quorum_cert)?;
        self.chain
            .set_block_commit(&mut wb, &BlockCommit::new(genesis.hash))?;
        self.chain.set_block_height(&mut wb, genesis.height);
        self.kv.write(wb)?;
        Ok(())
    }

    /// Commit one block at the next height. See the type-level docs for the step ordering
    /// and partial-failure semantics.
    pub fn commit(&self, mut data: CommitData) -> Result<(), StorageError> {
        let expected = self.get_block_height() + 1;
        if data.block.height != expected {
            return Err(StorageError::UnexpectedHeight {
                expected,
                got: data.block.height,
            });
        }
        let mut keys = HashSet::new();
        for change in &data.block_commit.state_changes {
            if !keys.insert(change.key.as_slice()) {
                return Err(StorageError::DuplicateStateKey);
            }
        }

        // Step 1: resolve previous values and leaf positions, recompute the dirty tree
        // nodes. In-memory only.
        let merkle_update = if data.block_commit.state_changes.is_empty() {
            None
        } else {
            let start = Instant::now();
            let update = self.compute_merkle_update(&mut data.block_commit);
            data.block_commit.elapsed_merkle = start.elapsed().as_secs_f64();
            log::debug!(
                "computed merkle update, block: {}, leaves: {}, elapsed: {:.6}s",
                short_hash(&data.block.hash.bytes()),
                update.leaves.len(),
                data.block_commit.elapsed_merkle,
            );
            Some(update)
        };

        // Step 2: chain data.
        let mut wb = K::WriteBatch::new();
        self.chain.set_block(&mut wb, &data.block)?;
        self.chain.set_last_qc(&mut wb, &data.qc)?;
        self.chain.set_txs(&mut wb, &data.transactions)?;
        self.chain.set_tx_commits(&mut wb, &data.tx_commits)?;
        self.kv.write(wb)?;

        // Step 3: the block commit record.
        let mut wb = K::WriteBatch::new();
        self.chain.set_block_commit(&mut wb, &data.block_commit)?;
        self.kv.write(wb)?;

        // Step 4: state and tree, in one batch under the writer lock.
        if let Some(update) = merkle_update {
            let _guard = match self.state_lock.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let mut wb = K::WriteBatch::new();
            self.state
                .commit_state_changes(&mut wb, &data.block_commit.state_changes);
            self.merkle_kv.commit_update(&mut wb, &update);
            self.kv.write(wb)?;
        }

        // Step 5: the commit becomes visible.
        let mut wb = K::WriteBatch::new();
        self.chain.set_block_height(&mut wb, data.block.height);
        self.kv.write(wb)?;

        log::debug!(
            "committed block, height: {}, block: {}, txs: {}",
            data.block.height,
            short_hash(&data.block.hash.bytes()),
            data.transactions.len(),
        );
        Ok(())
    }

    fn compute_merkle_update(&self, block_commit: &mut BlockCommit) -> UpdateResult {
        self.state.load_prev_values(&mut block_commit.state_changes);
        self.state
            .load_prev_tree_indexes(&mut block_commit.state_changes);
        let prev_leaf_count = self.merkle_kv.get_leaf_count();
        let leaf_count = self
            .state
            .set_new_tree_indexes(&mut block_commit.state_changes, prev_leaf_count);
        let leaves = self.state.compute_leaf_nodes(&block_commit.state_changes);
        let update = self.tree.update(leaves, leaf_count);

        block_commit.leaf_count = update.leaf_count.to_bytes_be();
        block_commit.merkle_root = update
            .root
            .as_ref()
            .map(|node| node.data.clone())
            .unwrap_or_default();
        update
    }

    pub fn get_block(&self, hash: &CryptoHash) -> Result<Option<Block>, StorageError> {
        self.chain.get_block(hash)
    }

    pub fn get_block_by_height(&self, height: u64) -> Result<Option<Block>, StorageError> {
        self.chain.get_block_by_height(height)
    }

    pub fn get_block_height(&self) -> u64 {
        self.chain.get_block_height()
    }

    pub fn get_last_qc(&self) -> Result<Option<QuorumCert>, StorageError> {
        self.chain.get_last_qc()
    }

    pub fn get_block_commit(&self, hash: &CryptoHash) -> Result<Option<BlockCommit>, StorageError> {
        self.chain.get_block_commit(hash)
    }

    pub fn get_tx(&self, hash: &CryptoHash) -> Result<Option<Transaction>, StorageError> {
        self.chain.get_tx(hash)
    }

    pub fn has_tx(&self, hash: &CryptoHash) -> bool {
        self.chain.has_tx(hash)
    }

    pub fn get_tx_commit(&self, hash: &CryptoHash) -> Result<Option<TxCommit>, StorageError> {
        self.chain.get_tx_commit(hash)
    }

    pub fn get_state(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.state.get_state(key)
    }

    /// The current state tree root, or `None` while no state has been written.
    pub fn get_merkle_root(&self) -> Option<Vec<u8>> {
        self.tree.root().map(|node| node.data)
    }

    /// Read `key` and prove it against the Merkle root.
    ///
    /// Takes the shared side of the state lock, so it sees a consistent (value, tree)
    /// pair even while commits are running.
    pub fn verify_state(&self, key: &[u8]) -> Result<Vec<u8>, StorageError> {
        let _guard = match self.state_lock.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let value = self.state.get_state(key).ok_or(StorageError::StateNotFound)?;
        let index = self
            .state
            .get_tree_index(key)
            .ok_or(StorageError::StateNotFound)?;
        let leaf = Node::new(
            Position::new(0, BigUint::from_bytes_be(&index)),
            StateStore::<K>::sum_state_value(&value),
        );
        if !self.tree.verify(&[leaf]) {
            return Err(StorageError::MerkleVerifyFailed);
        }
        Ok(value)
    }
}

/// Failures of the storage layer. All of them abort the commit in progress; the consensus
/// driver treats them as fatal.
#[derive(Debug)]
pub enum StorageError {
    /// `commit` was handed a block that does not extend the committed height.
    UnexpectedHeight { expected: u64, got: u64 },
    /// Two state changes in one commit reference the same key.
    DuplicateStateKey,
    /// `commit_genesis` on a store that already has a committed height.
    AlreadyInitialized,
    /// The key was never written, or has no Merkle leaf.
    StateNotFound,
    /// The stored value does not prove against the stored root.
    MerkleVerifyFailed,
    /// A stored value failed to decode.
    Corrupt(String),
    /// The engine failed.
    Store(StoreError),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::UnexpectedHeight { expected, got } => {
                write!(f, "expected block at height {}, got {}", expected, got)
            }
            StorageError::DuplicateStateKey => write!(f, "duplicate key in state changes"),
            StorageError::AlreadyInitialized => write!(f, "store is already initialized"),
            StorageError::StateNotFound => write!(f, "state not found"),
            StorageError::MerkleVerifyFailed => write!(f, "merkle verification failed"),
            StorageError::Corrupt(msg) => write!(f, "corrupt stored value: {}", msg),
            StorageError::Store(err) => write!(f, "{}", err),
        }
    }
}

impl From<StoreError> for StorageError {
    fn from(err: StoreError) -> Self {
        StorageError::Store(err)
    }
}
