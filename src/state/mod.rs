/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Persistence: the chain, the world state, and the Merkle tree that attests it, all kept
//! in one embedded key-value engine behind the [`kv_store::KVStore`] capability.
//!
//! [`storage::Storage`] is the only writer and owns the commit protocol. Reads go through
//! the same handle from any thread.

pub mod kv_store;

pub mod mem;

pub mod paths;

pub mod rocks;

pub mod storage;

pub(crate) mod chain_store;

pub(crate) mod merkle_store;

pub(crate) mod state_store;

pub use kv_store::{KVGet, KVStore, StoreError, WriteBatch};
pub use mem::MemStore;
pub use rocks::RocksStore;
pub use storage::{CommitData, Storage, StorageConfig, StorageError};
