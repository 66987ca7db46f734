/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The deterministic execution pipeline.
//!
//! [`Executor::execute`] turns a block's ordered transactions into state changes and
//! per-transaction commit records. It reads through the committed state plus an in-block
//! overlay and never writes storage itself; the storage layer persists the returned diff
//! when the block commits. Given the same parent state and the same transaction order,
//! every replica computes the same result.

pub mod chaincode;

pub mod coin;

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

use borsh::{BorshDeserialize, BorshSerialize};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::logging::short_hash;
use crate::state::{KVStore, Storage};
use crate::types::base64_bytes;
use crate::types::basic::CryptoHash;
use crate::types::block::Block;
use crate::types::commit::{BlockCommit, StateChange, TxCommit};
use crate::types::transaction::Transaction;

use chaincode::{CallContext, Chaincode, QueryContext};

/// Chaincode driver discriminants. Only native (built-in) chaincodes exist today.
pub const DRIVER_TYPE_NATIVE: u8 = 0;

// Deployed-code records live in the world state under this prefix followed by the deploy
// transaction's hash. Chaincode-scoped keys start with a 32-byte code address, so the two
// namespaces cannot collide in practice.
const CODE_RECORD_PREFIX: &[u8] = b"code/";

/// Identifies a chaincode implementation: a driver and a driver-specific code id.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct CodeInfo {
    pub driver_type: u8,
    #[serde(with = "base64_bytes")]
    pub code_id: Vec<u8>,
}

/// The JSON body of a deployment transaction (one with an empty code address).
#[derive(Serialize, Deserialize)]
pub struct DeploymentInput {
    pub code_info: CodeInfo,
}

/// Resolves [`CodeInfo`] records to chaincode implementations.
pub struct CodeRegistry {
    natives: HashMap<Vec<u8>, Arc<dyn Chaincode>>,
}

impl Default for CodeRegistry {
    fn default() -> Self {
        let mut natives: HashMap<Vec<u8>, Arc<dyn Chaincode>> = HashMap::new();
        natives.insert(coin::CODE_ID.to_vec(), Arc::new(coin::Coin));
        Self { natives }
    }
}

impl CodeRegistry {
    pub fn new() -> CodeRegistry {
        CodeRegistry::default()
    }

    fn resolve(&self, info: &CodeInfo) -> Result<Arc<dyn Chaincode>, ExecutionError> {
        if info.driver_type != DRIVER_TYPE_NATIVE {
            return Err(ExecutionError::BadInput(format!(
                "unknown driver type {}",
                info.driver_type
            )));
        }
        self.natives
            .get(&info.code_id)
            .cloned()
            .ok_or(ExecutionError::CodeNotFound)
    }
}

/// Failures while resolving or running a chaincode. Stringified into the transaction's
/// commit record; the transaction's writes are discarded.
#[derive(Debug)]
pub enum ExecutionError {
    /// The code address does not resolve to a deployed or native chaincode.
    CodeNotFound,
    /// Malformed deployment or call input.
    BadInput(String),
    /// The chaincode itself failed.
    Chaincode(String),
}

impl Display for ExecutionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::CodeNotFound => write!(f, "chaincode not found"),
            ExecutionError::BadInput(msg) => write!(f, "bad input: {}", msg),
            ExecutionError::Chaincode(msg) => write!(f, "{}", msg),
        }
    }
}

/// The deterministic state machine driving chaincodes over the committed state.
pub struct Executor<K: KVStore> {
    storage: Arc<Storage<K>>,
    registry: CodeRegistry,
}

impl<K: KVStore> Executor<K> {
    pub fn new(storage: Arc<Storage<K>>) -> Executor<K> {
        Executor {
            storage,
            registry: CodeRegistry::new(),
        }
    }

    /// Run `txs` in order against the committed state, producing the block's state diff
    /// and one commit record per transaction.
    ///
    /// A failing transaction contributes its error message and no state changes.
    /// `old_block_txs` lists transactions skipped because they committed in an earlier
    /// block; they are recorded on the block commit as-is.
    pub fn execute(
        &self,
        block: &Block,
        txs: &[Transaction],
        old_block_txs: Vec<CryptoHash>,
    ) -> (BlockCommit, Vec<TxCommit>) {
        let start = Instant::now();
        let mut overlay: IndexMap<Vec<u8>, Vec<u8>> = IndexMap::new();
        let mut tx_commits = Vec::with_capacity(txs.len());

        for tx in txs {
            let tx_start = Instant::now();
            let error = match self.execute_tx(&mut overlay, block, tx) {
                Ok(()) => String::new(),
                Err(err) => {
                    log::debug!("tx failed, tx: {}, reason: {}", short_hash(&tx.hash.bytes()), err);
                    err.to_string()
                }
            };
            tx_commits.push(TxCommit {
                hash: tx.hash,
                block_hash: block.hash,
                block_height: block.height,
                elapsed: tx_start.elapsed().as_secs_f64(),
                error,
            });
        }

        let mut block_commit = BlockCommit::new(block.hash);
        block_commit.state_changes = overlay
            .into_iter()
            .map(|(key, value)| StateChange::new(key, value))
            .collect();
        block_commit.elapsed_exec = start.elapsed().as_secs_f64();
        block_commit.old_block_txs = old_block_txs;
        (block_commit, tx_commits)
    }

    fn execute_tx(
        &self,
        overlay: &mut IndexMap<Vec<u8>, Vec<u8>>,
        block: &Block,
        tx: &Transaction,
    ) -> Result<(), ExecutionError> {
        let (code, code_addr, mut staged) = if tx.code_addr.is_empty() {
            // Deployment: the new code address is the deploy transaction's own hash.
            let input: DeploymentInput = serde_json::from_slice(&tx.input)
                .map_err(|err| ExecutionError::BadInput(err.to_string()))?;
            let code = self.registry.resolve(&input.code_info)?;
            let record = input
                .code_info
                .try_to_vec()
                .map_err(|err| ExecutionError::BadInput(err.to_string()))?;
            let mut staged = IndexMap::new();
            staged.insert(code_record_key(&tx.hash.bytes()), record);
            (code, tx.hash.bytes().to_vec(), staged)
        } else {
            let record = read_through(overlay, &self.storage, &code_record_key(&tx.code_addr))
                .ok_or(ExecutionError::CodeNotFound)?;
            let info = CodeInfo::deserialize(&mut record.as_slice())
                .map_err(|err| ExecutionError::BadInput(err.to_string()))?;
            let code = self.registry.resolve(&info)?;
            (code, tx.code_addr.clone(), IndexMap::new())
        };

        let mut ctx = TxContext {
            storage: &self.storage,
            overlay,
            staged: &mut staged,
            code_addr: &code_addr,
            sender: &tx.sender,
            input: &tx.input,
            block_height: block.height,
        };
        let result = if tx.code_addr.is_empty() {
            code.init(&mut ctx)
        } else {
            code.invoke(&mut ctx)
        };
        result.map_err(|err| ExecutionError::Chaincode(err.0))?;

        // The transaction succeeded; its writes become visible to the rest of the block.
        for (key, value) in staged {
            overlay.insert(key, value);
        }
        Ok(())
    }

    /// Run a read-only chaincode query against the committed state.
    pub fn query(&self, code_addr: &[u8], input: &[u8]) -> Result<Vec<u8>, ExecutionError> {
        let record = self
            .storage
            .get_state(&code_record_key(code_addr))
            .ok_or(ExecutionError::CodeNotFound)?;
        let info = CodeInfo::deserialize(&mut record.as_slice())
            .map_err(|err| ExecutionError::BadInput(err.to_string()))?;
        let code = self.registry.resolve(&info)?;
        let ctx = ReadContext {
            storage: &self.storage,
            code_addr,
            input,
        };
        code.query(&ctx).map_err(|err| ExecutionError::Chaincode(err.0))
    }
}

fn code_record_key(code_addr: &[u8]) -> Vec<u8> {
    let mut key = CODE_RECORD_PREFIX.to_vec();
    key.extend_from_slice(code_addr);
    key
}

fn scoped_key(code_addr: &[u8], key: &[u8]) -> Vec<u8> {
    let mut scoped = code_addr.to_vec();
    scoped.extend_from_slice(key);
    scoped
}

fn read_through<K: KVStore>(
    overlay: &IndexMap<Vec<u8>, Vec<u8>>,
    storage: &Storage<K>,
    key: &[u8],
) -> Option<Vec<u8>> {
    overlay
        .get(key)
        .cloned()
        .or_else(|| storage.get_state(key))
}

// Execution-time view: this transaction's staged writes, then the block's overlay, then
// the committed state.
struct TxContext<'a, K: KVStore> {
    storage: &'a Storage<K>,
    overlay: &'a IndexMap<Vec<u8>, Vec<u8>>,
    staged: &'a mut IndexMap<Vec<u8>, Vec<u8>>,
    code_addr: &'a [u8],
    sender: &'a [u8],
    input: &'a [u8],
    block_height: u64,
}

impl<K: KVStore> QueryContext for TxContext<'_, K> {
    fn input(&self) -> &[u8] {
        self.input
    }

    fn get_state(&self, key: &[u8]) -> Option<Vec<u8>> {
        let key = scoped_key(self.code_addr, key);
        self.staged
            .get(&key)
            .cloned()
            .or_else(|| read_through(self.overlay, self.storage, &key))
    }
}

impl<K: KVStore> CallContext for TxContext<'_, K> {
    fn sender(&self) -> &[u8] {
        self.sender
    }

    fn block_height(&self) -> u64 {
        self.block_height
    }

    fn set_state(&mut self, key: &[u8], value: Vec<u8>) {
        self.staged.insert(scoped_key(self.code_addr, key), value);
    }
}

// Query-time view: committed state only.
struct ReadContext<'a, K: KVStore> {
    storage: &'a Storage<K>,
    code_addr: &'a [u8],
    input: &'a [u8],
}

impl<K: KVStore> QueryContext for ReadContext<'_, K> {
    fn input(&self) -> &[u8] {
        self.input
    }

    fn get_state(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.storage.get_state(&scoped_key(self.code_addr, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CommitData, MemStore, StorageConfig};
    use crate::types::basic::CryptoHash;
    use crate::types::keypair::Keypair;
    use crate::types::quorum_cert::QuorumCert;

    fn deploy_input() -> Vec<u8> {
        serde_json::to_vec(&DeploymentInput {
            code_info: CodeInfo {
                driver_type: DRIVER_TYPE_NATIVE,
                code_id: coin::CODE_ID.to_vec(),
            },
        })
        .unwrap()
    }

    fn coin_input(method: &str, dest: &[u8], value: i64) -> Vec<u8> {
        serde_json::to_vec(&coin::Input {
            method: method.to_string(),
            dest: dest.to_vec(),
            value,
        })
        .unwrap()
    }

    struct Chain {
        storage: Arc<Storage<MemStore>>,
        executor: Executor<MemStore>,
        proposer: Keypair,
        parent: CryptoHash,
        height: u64,
    }

    impl Chain {
        fn new() -> Chain {
            let storage = Arc::new(Storage::new(MemStore::new(), StorageConfig::default()));
            storage.commit_genesis(&Block::genesis()).unwrap();
            Chain {
                executor: Executor::new(storage.clone()),
                storage,
                proposer: Keypair::generate(),
                parent: CryptoHash::zero(),
                height: 0,
            }
        }

        // Execute `txs` as the next block and commit the result.
        fn commit_block(&mut self, txs: Vec<Transaction>) -> Vec<TxCommit> {
            self.height += 1;
            let block = Block::new(
                self.height,
                self.parent,
                QuorumCert::genesis(),
                0,
                Vec::new(),
                txs.iter().map(|tx| tx.hash).collect(),
                &self.proposer,
            );
            self.parent = block.hash;
            let (block_commit, tx_commits) = self.executor.execute(&block, &txs, Vec::new());
            self.storage
                .commit(CommitData {
                    block,
                    qc: QuorumCert::genesis(),
                    transactions: txs,
                    block_commit,
                    tx_commits: tx_commits.clone(),
                })
                .unwrap();
            tx_commits
        }
    }

    #[test]
    fn deploy_mint_transfer_and_query() {
        let mut chain = Chain::new();
        let minter = Keypair::generate();
        let alice = Keypair::generate();
        let bob = Keypair::generate();

        let deploy = Transaction::new(1, Vec::new(), deploy_input(), &minter);
        let code_addr = deploy.hash.bytes().to_vec();
        let commits = chain.commit_block(vec![deploy]);
        assert!(commits[0].error.is_empty());

        let mint = Transaction::new(
            2,
            code_addr.clone(),
            coin_input("mint", &alice.public_bytes(), 10_000_000_000),
            &minter,
        );
        let commits = chain.commit_block(vec![mint]);
        assert!(commits[0].error.is_empty());

        let balance: i64 = serde_json::from_slice(
            &chain
                .executor
                .query(&code_addr, &coin_input("balance", &alice.public_bytes(), 0))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(10_000_000_000, balance);

        // The balance is attested by the state tree.
        let key = scoped_key(&code_addr, &alice.public_bytes());
        let value = chain.storage.verify_state(&key).unwrap();
        assert_eq!(10_000_000_000i64.to_be_bytes().to_vec(), value);

        let transfer = Transaction::new(
            3,
            code_addr.clone(),
            coin_input("transfer", &bob.public_bytes(), 7),
            &alice,
        );
        let commits = chain.commit_block(vec![transfer]);
        assert!(commits[0].error.is_empty());

        let balance: i64 = serde_json::from_slice(
            &chain
                .executor
                .query(&code_addr, &coin_input("balance", &bob.public_bytes(), 0))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(7, balance);
    }

    #[test]
    fn failing_tx_contributes_no_state_changes() {
        let mut chain = Chain::new();
        let minter = Keypair::generate();
        let outsider = Keypair::generate();

        let deploy = Transaction::new(1, Vec::new(), deploy_input(), &minter);
        let code_addr = deploy.hash.bytes().to_vec();
        chain.commit_block(vec![deploy]);

        // Mint by a non-owner fails; an overdraft fails; both leave no trace in state.
        let bad_mint = Transaction::new(
            2,
            code_addr.clone(),
            coin_input("mint", &outsider.public_bytes(), 5),
            &outsider,
        );
        let overdraft = Transaction::new(
            3,
            code_addr.clone(),
            coin_input("transfer", &minter.public_bytes(), 5),
            &outsider,
        );
        let commits = chain.commit_block(vec![bad_mint, overdraft]);
        assert_eq!("mint not allowed", commits[0].error);
        assert_eq!("insufficient balance", commits[1].error);

        let key = scoped_key(&code_addr, &outsider.public_bytes());
        assert!(chain.storage.get_state(&key).is_none());
    }

    #[test]
    fn calling_an_undeployed_address_fails() {
        let mut chain = Chain::new();
        let caller = Keypair::generate();
        let call = Transaction::new(
            1,
            vec![9u8; 32],
            coin_input("mint", &caller.public_bytes(), 5),
            &caller,
        );
        let commits = chain.commit_block(vec![call]);
        assert_eq!(ExecutionError::CodeNotFound.to_string(), commits[0].error);
    }
}
