/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The production [`KVStore`] over RocksDB.

use std::path::Path;
use std::sync::Arc;

use super::kv_store::{KVGet, KVStore, StoreError, WriteBatch};

/// A RocksDB-backed [`KVStore`]. Clones share the same database handle.
#[derive(Clone)]
pub struct RocksStore(Arc<rocksdb::DB>);

impl RocksStore {
    /// Open (or create) the database under `path`.
    pub fn open(path: &Path) -> Result<RocksStore, StoreError> {
        let db = rocksdb::DB::open_default(path).map_err(|err| StoreError(err.to_string()))?;
        Ok(RocksStore(Arc::new(db)))
    }
}

impl KVGet for RocksStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        // A read error is indistinguishable from absence here; writes are where engine
        // failures must stop the world, and those are surfaced by `write`.
        self.0.get(key).ok().flatten()
    }
}

impl KVStore for RocksStore {
    type WriteBatch = RocksWriteBatch;

    fn write(&self, wb: Self::WriteBatch) -> Result<(), StoreError> {
        self.0
            .write(wb.0)
            .map_err(|err| StoreError(err.to_string()))
    }
}

pub struct RocksWriteBatch(rocksdb::WriteBatch);

impl WriteBatch for RocksWriteBatch {
    fn new() -> Self {
        RocksWriteBatch(rocksdb::WriteBatch::default())
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.0.put(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.0.delete(key);
    }
}
