/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Reads and batched writes for the chain data: blocks, transactions, and their commit
//! records.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::basic::CryptoHash;
use crate::types::block::Block;
use crate::types::commit::{BlockCommit, TxCommit};
use crate::types::quorum_cert::QuorumCert;
use crate::types::transaction::Transaction;

use super::kv_store::{KVGet, WriteBatch};
use super::paths::{self, combine};
use super::storage::StorageError;

pub(crate) struct ChainStore<K> {
    kv: K,
}

impl<K: KVGet> ChainStore<K> {
    pub(crate) fn new(kv: K) -> ChainStore<K> {
        ChainStore { kv }
    }

    pub(crate) fn get_block(&self, hash: &CryptoHash) -> Result<Option<Block>, StorageError> {
        decode(self.kv.get(&combine(&paths::BLOCKS, &hash.bytes())), "block")
    }

    pub(crate) fn get_block_by_height(&self, height: u64) -> Result<Option<Block>, StorageError> {
        let hash = self
            .kv
            .get(&combine(&paths::BLOCK_AT_HEIGHT, &height.to_be_bytes()));
        match hash {
            Some(bytes) => match CryptoHash::from_slice(&bytes) {
                Some(hash) => self.get_block(&hash),
                None => Err(StorageError::Corrupt(String::from("block hash by height"))),
            },
            None => Ok(None),
        }
    }

    /// The committed chain height. 0 both for a fresh store and for a store holding only
    /// the genesis block; [`has_block_height`](Self::has_block_height) tells them apart.
    pub(crate) fn get_block_height(&self) -> u64 {
        match self.kv.get(&paths::BLOCK_HEIGHT) {
            Some(bytes) => match bytes.try_into() {
                Ok(arr) => u64::from_be_bytes(arr),
                Err(_) => 0,
            },
            None => 0,
        }
    }

    pub(crate) fn has_block_height(&self) -> bool {
        self.kv.get(&paths::BLOCK_HEIGHT).is_some()
    }

    pub(crate) fn get_last_qc(&self) -> Result<Option<QuorumCert>, StorageError> {
        decode(self.kv.get(&paths::LAST_QC), "last qc")
    }

    pub(crate) fn get_tx(&self, hash: &CryptoHash) -> Result<Option<Transaction>, StorageError> {
        decode(self.kv.get(&combine(&paths::TXS, &hash.bytes())), "transaction")
    }

    pub(crate) fn has_tx(&self, hash: &CryptoHash) -> bool {
        self.kv.get(&combine(&paths::TXS, &hash.bytes())).is_some()
    }

    pub(crate) fn get_tx_commit(&self, hash: &CryptoHash) -> Result<Option<TxCommit>, StorageError> {
        decode(
            self.kv.get(&combine(&paths::TX_COMMITS, &hash.bytes())),
            "tx commit",
        )
    }

    pub(crate) fn get_block_commit(
        &self,
        hash: &CryptoHash,
    ) -> Result<Option<BlockCommit>, StorageError> {
        decode(
            self.kv.get(&combine(&paths::BLOCK_COMMITS, &hash.bytes())),
            "block commit",
        )
    }

    pub(crate) fn set_block<W: WriteBatch>(&self, wb: &mut W, block: &Block) -> Result<(), StorageError> {
        wb.set(
            &combine(&paths::BLOCKS, &block.hash.bytes()),
            &encode(block)?,
        );
        wb.set(
            &combine(&paths::BLOCK_AT_HEIGHT, &block.height.to_be_bytes()),
            &block.hash.bytes(),
        );
        Ok(())
    }

    pub(crate) fn set_last_qc<W: WriteBatch>(&self, wb: &mut W, qc: &QuorumCert) -> Result<(), StorageError> {
        wb.set(&paths::LAST_QC, &encode(qc)?);
        Ok(())
    }

    pub(crate) fn set_txs<W: WriteBatch>(&self, wb: &mut W, txs: &[Transaction]) -> Result<(), StorageError> {
        for tx in txs {
            wb.set(&combine(&paths::TXS, &tx.hash.bytes()), &encode(tx)?);
        }
        Ok(())
    }

    pub(crate) fn set_tx_commits<W: WriteBatch>(
        &self,
        wb: &mut W,
        tx_commits: &[TxCommit],
    ) -> Result<(), StorageError> {
        for txc in tx_commits {
            wb.set(&combine(&paths::TX_COMMITS, &txc.hash.bytes()), &encode(txc)?);
        }
        Ok(())
    }

    pub(crate) fn set_block_commit<W: WriteBatch>(
        &self,
        wb: &mut W,
        block_commit: &BlockCommit,
    ) -> Result<(), StorageError> {
        wb.set(
            &combine(&paths::BLOCK_COMMITS, &block_commit.block_hash.bytes()),
            &encode(block_commit)?,
        );
        Ok(())
    }

    pub(crate) fn set_block_height<W: WriteBatch>(&self, wb: &mut W, height: u64) {
        wb.set(&paths::BLOCK_HEIGHT, &height.to_be_bytes());
    }
}

fn encode<T: BorshSerialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    value
        .try_to_vec()
        .map_err(|err| StorageError::Corrupt(err.to_string()))
}

fn decode<T: BorshDeserialize>(bytes: Option<Vec<u8>>, what: &str) -> Result<Option<T>, StorageError> {
    match bytes {
        Some(bytes) => T::deserialize(&mut bytes.as_slice())
            .map(Some)
            .map_err(|err| StorageError::Corrupt(format!("{}: {}", what, err))),
        None => Ok(None),
    }
}
