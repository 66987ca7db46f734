//! Storage-layer properties: commit monotonicity, verified state reads, and tamper
//! detection, over the in-memory store plus a RocksDB smoke test.

use kauri::state::paths::{self, combine};
use kauri::state::{CommitData, MemStore, RocksStore, Storage, StorageConfig, StorageError};
use kauri::types::basic::CryptoHash;
use kauri::types::block::Block;
use kauri::types::commit::{BlockCommit, StateChange};
use kauri::types::keypair::Keypair;
use kauri::types::quorum_cert::QuorumCert;

struct ChainBuilder {
    proposer: Keypair,
    parent: CryptoHash,
    height: u64,
}

impl ChainBuilder {
    fn new() -> ChainBuilder {
        ChainBuilder {
            proposer: Keypair::generate(),
            parent: CryptoHash::zero(),
            height: 0,
        }
    }

    // The next empty block, with the given state changes attached to its commit record.
    fn next(&mut self, changes: Vec<StateChange>) -> CommitData {
        self.height += 1;
        let block = Block::new(
            self.height,
            self.parent,
            QuorumCert::genesis(),
            0,
            Vec::new(),
            Vec::new(),
            &self.proposer,
        );
        self.parent = block.hash;
        let mut block_commit = BlockCommit::new(block.hash);
        block_commit.state_changes = changes;
        CommitData {
            qc: QuorumCert::genesis(),
            transactions: Vec::new(),
            tx_commits: Vec::new(),
            block,
            block_commit,
        }
    }
}

fn change(key: &[u8], value: &[u8]) -> StateChange {
    StateChange::new(key.to_vec(), value.to_vec())
}

#[test]
fn commits_are_monotone_and_blocks_retrievable() {
    let storage = Storage::new(MemStore::new(), StorageConfig::default());
    storage.commit_genesis(&Block::genesis()).unwrap();
    assert_eq!(0, storage.get_block_height());

    let mut chain = ChainBuilder::new();
    let mut hashes = Vec::new();
    for height in 1..=5u64 {
        let data = chain.next(vec![change(b"counter", &height.to_be_bytes())]);
        hashes.push(data.block.hash);
        storage.commit(data).unwrap();
        assert_eq!(height, storage.get_block_height());
    }

    for (i, hash) in hashes.iter().enumerate() {
        let by_hash = storage.get_block(hash).unwrap().unwrap();
        let by_height = storage.get_block_by_height(i as u64 + 1).unwrap().unwrap();
        assert_eq!(by_hash, by_height);
        assert!(storage.get_block_commit(hash).unwrap().is_some());
    }
}

#[test]
fn commit_rejects_height_gaps() {
    let storage = Storage::new(MemStore::new(), StorageConfig::default());
    storage.commit_genesis(&Block::genesis()).unwrap();

    let mut chain = ChainBuilder::new();
    let mut skipped = chain.next(Vec::new());
    skipped.block.height = 7;
    assert!(matches!(
        storage.commit(skipped),
        Err(StorageError::UnexpectedHeight { expected: 1, got: 7 })
    ));
    assert_eq!(0, storage.get_block_height());
}

#[test]
fn commit_rejects_duplicate_state_keys() {
    let storage = Storage::new(MemStore::new(), StorageConfig::default());
    storage.commit_genesis(&Block::genesis()).unwrap();

    let mut chain = ChainBuilder::new();
    let duplicate = chain.next(vec![change(b"k", b"1"), change(b"k", b"2")]);
    assert!(matches!(
        storage.commit(duplicate),
        Err(StorageError::DuplicateStateKey)
    ));
}

#[test]
fn genesis_can_only_be_committed_once() {
    let storage = Storage::new(MemStore::new(), StorageConfig::default());
    storage.commit_genesis(&Block::genesis()).unwrap();
    assert!(matches!(
        storage.commit_genesis(&Block::genesis()),
        Err(StorageError::AlreadyInitialized)
    ));
}

#[test]
fn verify_state_proves_values_and_detects_tampering() {
    let kv = MemStore::new();
    let storage = Storage::new(kv.clone(), StorageConfig::default());
    storage.commit_genesis(&Block::genesis()).unwrap();

    let mut chain = ChainBuilder::new();
    storage
        .commit(chain.next(vec![change(b"alpha", b"1"), change(b"beta", b"2")]))
        .unwrap();
    storage
        .commit(chain.next(vec![change(b"alpha", b"3"), change(b"gamma", b"4")]))
        .unwrap();

    assert_eq!(b"3".to_vec(), storage.verify_state(b"alpha").unwrap());
    assert_eq!(b"2".to_vec(), storage.verify_state(b"beta").unwrap());
    assert_eq!(b"4".to_vec(), storage.verify_state(b"gamma").unwrap());
    assert!(storage.get_merkle_root().is_some());

    assert!(matches!(
        storage.verify_state(b"missing"),
        Err(StorageError::StateNotFound)
    ));

    // Flip the stored value behind the tree's back.
    kv.put_raw(&combine(&paths::STATE, b"beta"), b"9");
    assert!(matches!(
        storage.verify_state(b"beta"),
        Err(StorageError::MerkleVerifyFailed)
    ));
}

#[test]
fn merkle_root_matches_across_reopen_on_rocksdb() {
    let dir = tempfile::tempdir().unwrap();

    let root_before = {
        let storage = Storage::new(
            RocksStore::open(dir.path()).unwrap(),
            StorageConfig::default(),
        );
        storage.commit_genesis(&Block::genesis()).unwrap();
        let mut chain = ChainBuilder::new();
        storage
            .commit(chain.next(vec![change(b"alpha", b"1")]))
            .unwrap();
        storage.get_merkle_root().unwrap()
    };

    let storage = Storage::new(
        RocksStore::open(dir.path()).unwrap(),
        StorageConfig::default(),
    );
    assert_eq!(1, storage.get_block_height());
    assert_eq!(Some(root_before), storage.get_merkle_root());
    assert_eq!(b"1".to_vec(), storage.verify_state(b"alpha").unwrap());
    assert!(storage.get_last_qc().unwrap().is_some());
}
