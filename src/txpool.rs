/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The pending-transaction buffer.
//!
//! One pool per process, shared between the HTTP submit handlers and the consensus driver.
//! Transactions keep their first-seen order until a leader draws them into a proposal.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

use crate::state::{KVStore, Storage};
use crate::types::basic::CryptoHash;
use crate::types::transaction::Transaction;
use crate::types::ValidationError;

/// Where a transaction stands, as reported over the status endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxStatus {
    NotFound = 0,
    /// In the pool, not yet drawn into a proposal.
    Pending = 1,
    /// Drawn into a proposal, awaiting commit.
    Queued = 2,
    Committed = 3,
}

/// Why a submission was turned away.
#[derive(Debug)]
pub enum PoolError {
    /// The transaction is already pending, queued, or committed.
    DuplicateTx,
    InvalidTx(ValidationError),
}

impl Display for PoolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::DuplicateTx => write!(f, "transaction already known"),
            PoolError::InvalidTx(err) => write!(f, "invalid transaction: {}", err),
        }
    }
}

/// A deduplicated buffer of not-yet-committed transactions with per-transaction status.
pub struct TxPool<K: KVStore> {
    storage: Arc<Storage<K>>,
    inner: Mutex<PoolInner>,
}

#[derive(Default)]
struct PoolInner {
    // Pending and queued bodies, in first-seen order.
    transactions: IndexMap<CryptoHash, Transaction>,
    status: HashMap<CryptoHash, TxStatus>,
}

impl<K: KVStore> TxPool<K> {
    pub fn new(storage: Arc<Storage<K>>) -> TxPool<K> {
        TxPool {
            storage,
            inner: Mutex::new(PoolInner::default()),
        }
    }

    /// Accept a client submission: validate the signature, reject anything already known
    /// or already committed.
    pub fn submit(&self, tx: Transaction) -> Result<(), PoolError> {
        tx.validate().map_err(PoolError::InvalidTx)?;
        let mut inner = self.inner.lock().unwrap();
        if inner.status.contains_key(&tx.hash) {
            return Err(PoolError::DuplicateTx);
        }
        if self
            .storage
            .get_tx_commit(&tx.hash)
            .ok()
            .flatten()
            .is_some()
        {
            return Err(PoolError::DuplicateTx);
        }
        inner.status.insert(tx.hash, TxStatus::Pending);
        inner.transactions.insert(tx.hash, tx);
        Ok(())
    }

    /// Absorb transactions relayed by a peer. Duplicates are dropped quietly; invalid
    /// bodies are dropped quietly too, per the driver-boundary error policy.
    pub fn add_from_peer(&self, txs: impl IntoIterator<Item = Transaction>) {
        for tx in txs {
            let _ = self.submit(tx);
        }
    }

    /// Draw up to `n` pending transactions in first-seen order, marking them queued.
    pub fn pop_for_proposal(&self, n: usize) -> Vec<Transaction> {
        let mut inner = self.inner.lock().unwrap();
        let picked: Vec<Transaction> = inner
            .transactions
            .values()
            .filter(|tx| inner.status.get(&tx.hash) == Some(&TxStatus::Pending))
            .take(n)
            .cloned()
            .collect();
        for tx in &picked {
            inner.status.insert(tx.hash, TxStatus::Queued);
        }
        picked
    }

    /// The body of a known pending or queued transaction.
    pub fn get_tx(&self, hash: &CryptoHash) -> Option<Transaction> {
        self.inner.lock().unwrap().transactions.get(hash).cloned()
    }

    /// Mark pending transactions as queued because a proposal references them. Keeps the
    /// next leader from re-proposing transactions that are already in flight.
    pub fn mark_queued(&self, hashes: &[CryptoHash]) {
        let mut inner = self.inner.lock().unwrap();
        for hash in hashes {
            if inner.status.get(hash) == Some(&TxStatus::Pending) {
                inner.status.insert(*hash, TxStatus::Queued);
            }
        }
    }

    /// Drop committed transactions from the buffer and remember their terminal status.
    pub fn mark_committed(&self, hashes: &[CryptoHash]) {
        let mut inner = self.inner.lock().unwrap();
        for hash in hashes {
            inner.transactions.shift_remove(hash);
            inner.status.insert(*hash, TxStatus::Committed);
        }
    }

    pub fn get_status(&self, hash: &CryptoHash) -> TxStatus {
        if let Some(status) = self.inner.lock().unwrap().status.get(hash) {
            return *status;
        }
        // The pool forgets across restarts; fall back to the committed record.
        if self
            .storage
            .get_tx_commit(hash)
            .ok()
            .flatten()
            .is_some()
        {
            return TxStatus::Committed;
        }
        TxStatus::NotFound
    }
}
