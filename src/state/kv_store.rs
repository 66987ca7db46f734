/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The key-value store capability that the storage layer is built on.
//!
//! Implementations must apply a [`WriteBatch`] atomically: either every operation in the
//! batch becomes visible or none does. The commit protocol in
//! [`storage`](super::storage::Storage) relies on this to keep each of its steps
//! all-or-nothing.

use std::fmt::{self, Display, Formatter};

/// Read access to the underlying engine.
pub trait KVGet {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
}

/// A set of writes applied atomically by [`KVStore::write`].
pub trait WriteBatch {
    fn new() -> Self;

    fn set(&mut self, key: &[u8], value: &[u8]);

    fn delete(&mut self, key: &[u8]);
}

/// A shareable handle to the embedded engine.
pub trait KVStore: KVGet + Clone + Send + Sync + 'static {
    type WriteBatch: WriteBatch;

    fn write(&self, wb: Self::WriteBatch) -> Result<(), StoreError>;
}

/// An engine-level I/O failure. Fatal to the commit in progress.
#[derive(Debug)]
pub struct StoreError(pub String);

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "key-value engine error: {}", self.0)
    }
}
