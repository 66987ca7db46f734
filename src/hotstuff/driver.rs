/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The consensus event loop.
//!
//! One driver thread owns all HotStuff state; proposals, votes, and new-view messages reach
//! it over a channel, so no two handlers ever race on the view number, the vote height, or
//! the certificate trackers.
//!
//! # Protocol shape
//!
//! Views and block heights coincide while the chain progresses: the leader of view `v`
//! proposes the block at height `v`, and votes for it go to `leader(v + 1)`, who assembles
//! the certificate and proposes next. A pacemaker timeout advances the view past a stalled
//! leader and hands the highest known certificate to the next one; the first successful
//! proposal re-synchronizes the rotation to heights.
//!
//! # Safety
//!
//! A replica votes at most once per height (`vote_height` is strictly increasing), and a
//! vote requires the proposal to sit directly on the block its certificate proves. The
//! highest certificate a replica has seen doubles as its lock: a proposal justified by
//! anything older is only voted for if it still extends the locked block. Committing takes
//! the full three-chain: a block is committed once two direct descendants at consecutive
//! heights carry certificates.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::execution::Executor;
use crate::logging::short_hash;
use crate::networking::Network;
use crate::state::{CommitData, KVStore, Storage, StorageError};
use crate::txpool::TxPool;
use crate::types::basic::CryptoHash;
use crate::types::block::Block;
use crate::types::keypair::Keypair;
use crate::types::quorum_cert::{QuorumCert, Vote};
use crate::types::transaction::{Transaction, TxList};
use crate::types::validator_set::ValidatorSet;

use super::messages::Envelope;
use super::pacemaker::Pacemaker;
use super::voting::VoteCollector;

#[derive(Clone, Copy)]
pub struct DriverConfig {
    /// How long a view may go without progress before the pacemaker fires.
    pub view_timeout: Duration,
    /// Pause before each proposal. Bounds the block rate when the pool is empty.
    pub proposal_interval: Duration,
    /// Maximum transactions drawn into one proposal.
    pub batch_size: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            view_timeout: Duration::from_secs(1),
            proposal_interval: Duration::from_millis(25),
            batch_size: 500,
        }
    }
}

/// Failures that stop the driver. Losing liveness is preferable to committing over a
/// storage layer in an unknown state.
#[derive(Debug)]
pub enum DriverError {
    Storage(StorageError),
    /// A committed block references a transaction body this replica never received.
    TxNotFound(CryptoHash),
}

impl Display for DriverError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::Storage(err) => write!(f, "{}", err),
            DriverError::TxNotFound(hash) => {
                write!(f, "missing body for transaction {}", hash)
            }
        }
    }
}

impl From<StorageError> for DriverError {
    fn from(err: StorageError) -> Self {
        DriverError::Storage(err)
    }
}

/// The consensus state machine of one replica.
pub struct Driver<K: KVStore, N: Network> {
    keypair: Keypair,
    validators: ValidatorSet,
    config: DriverConfig,
    storage: Arc<Storage<K>>,
    pool: Arc<TxPool<K>>,
    executor: Executor<K>,
    network: N,
    pacemaker: Pacemaker,
    votes: VoteCollector,

    // Valid proposals above the committed height, by hash.
    window: HashMap<CryptoHash, Block>,
    // Certificates assembled from votes that arrived before their block did.
    pending_qcs: HashMap<CryptoHash, QuorumCert>,

    view: u64,
    // Height of the last block voted for. Strictly increasing.
    vote_height: u64,
    // The highest certificate seen. Doubles as the lock in the vote rule.
    high_qc: QuorumCert,
    high_qc_height: u64,
    // The last view this replica proposed in, to keep new-view handling idempotent.
    proposed_view: u64,
}

impl<K: KVStore, N: Network> Driver<K, N> {
    pub fn new(
        keypair: Keypair,
        validators: ValidatorSet,
        config: DriverConfig,
        storage: Arc<Storage<K>>,
        pool: Arc<TxPool<K>>,
        executor: Executor<K>,
        network: N,
    ) -> Result<Driver<K, N>, StorageError> {
        let high_qc = storage.get_last_qc()?.unwrap_or_else(QuorumCert::genesis);
        let high_qc_height = match storage.get_block(&high_qc.block_hash)? {
            Some(block) => block.height,
            None => 0,
        };
        let committed = storage.get_block_height();
        Ok(Driver {
            keypair,
            votes: VoteCollector::new(validators.clone()),
            validators,
            config,
            pool,
            executor,
            network,
            pacemaker: Pacemaker::new(config.view_timeout),
            window: HashMap::new(),
            pending_qcs: HashMap::new(),
            view: committed,
            vote_height: committed,
            high_qc,
            high_qc_height,
            proposed_view: 0,
            storage,
        })
    }

    fn i_am(&self, pubkey: &[u8]) -> bool {
        pubkey == self.keypair.public_bytes()
    }

    fn lookup_block(&self, hash: &CryptoHash) -> Result<Option<Block>, StorageError> {
        if let Some(block) = self.window.get(hash) {
            return Ok(Some(block.clone()));
        }
        self.storage.get_block(hash)
    }

    /// Enter `view` and propose if this replica leads it.
    fn start_view(&mut self, view: u64) -> Result<(), DriverError> {
        self.view = view;
        self.pacemaker.restart();
        log::debug!("start view, view: {}", view);
        if self.i_am(self.validators.leader(view)) {
            self.propose()?;
        }
        Ok(())
    }

    fn handle(&mut self, origin: &[u8], envelope: Envelope) -> Result<(), DriverError> {
        match envelope {
            Envelope::Proposal(block) => self.on_receive_proposal(block),
            Envelope::Vote(vote) => self.on_receive_vote(vote),
            Envelope::NewView(qc) => self.on_receive_new_view(origin, qc),
            // TxList normally goes straight to the pool in the poller; accept it here too.
            Envelope::TxList(txs) => {
                self.pool.add_from_peer(txs.0);
                Ok(())
            }
        }
    }

    fn on_receive_proposal(&mut self, block: Block) -> Result<(), DriverError> {
        if self.lookup_block(&block.hash)?.is_some() {
            return Ok(());
        }
        if let Err(err) = block.validate(&self.validators) {
            log::debug!(
                "dropping proposal, block: {}, reason: {}",
                short_hash(&block.hash.bytes()),
                err
            );
            return Ok(());
        }
        // The proposal must sit directly on the block its certificate proves.
        if block.parent_hash != block.quorum_cert.block_hash {
            log::debug!(
                "dropping proposal, block: {}, reason: parent does not match justification",
                short_hash(&block.hash.bytes())
            );
            return Ok(());
        }
        let parent = match self.lookup_block(&block.parent_hash)? {
            Some(parent) => parent,
            None => {
                log::debug!(
                    "dropping proposal, block: {}, reason: unknown parent",
                    short_hash(&block.hash.bytes())
                );
                return Ok(());
            }
        };
        if block.height != parent.height + 1 {
            log::debug!(
                "dropping proposal, block: {}, reason: height {} does not extend parent {}",
                short_hash(&block.hash.bytes()),
                block.height,
                parent.height
            );
            return Ok(());
        }

        log::debug!(
            "received proposal, block: {}, height: {}, proposer: {}",
            short_hash(&block.hash.bytes()),
            block.height,
            short_hash(&block.proposer),
        );
        self.window.insert(block.hash, block.clone());
        // These transactions are in flight now; the next proposal should not repeat them.
        self.pool.mark_queued(&block.transactions);
        self.update_high_qc(block.quorum_cert.clone(), parent.height);

        // A quorum may have formed from votes that outran this proposal.
        if let Some(qc) = self.pending_qcs.remove(&block.hash) {
            self.on_qc(qc, block.height)?;
        }

        self.try_commit(&block)?;

        // The vote rule: once per height, and only on top of a certificate at least as
        // high as the lock (or on a chain that still extends the locked block).
        let safe = block.height > self.vote_height
            && (parent.height >= self.high_qc_height
                || self.extends(&block, &self.high_qc.block_hash)?);
        if safe {
            self.vote_height = block.height;
            let vote = block.vote(&self.keypair);
            let next_leader = self.validators.leader(block.height + 1).to_vec();
            log::debug!(
                "vote, block: {}, height: {}, next leader: {}",
                short_hash(&block.hash.bytes()),
                block.height,
                short_hash(&next_leader),
            );
            if self.i_am(&next_leader) {
                self.on_receive_vote(vote)?;
            } else {
                self.network.send(&next_leader, Envelope::Vote(vote));
            }
            if block.height > self.view {
                self.view = block.height;
                self.pacemaker.restart();
            }
        }
        Ok(())
    }

    fn on_receive_vote(&mut self, vote: Vote) -> Result<(), DriverError> {
        let block_hash = vote.block_hash;
        if let Some(qc) = self.votes.collect(vote) {
            match self.lookup_block(&block_hash)? {
                Some(block) => self.on_qc(qc, block.height)?,
                // The proposal has not reached us yet; hold the certificate for it.
                None => {
                    self.pending_qcs.insert(block_hash, qc);
                }
            }
        }
        Ok(())
    }

    /// A quorum stands behind the block at `certified_height`. As the leader of the next
    /// view, extend it.
    fn on_qc(&mut self, qc: QuorumCert, certified_height: u64) -> Result<(), DriverError> {
        log::debug!(
            "collected certificate, block: {}, height: {}",
            short_hash(&qc.block_hash.bytes()),
            certified_height
        );
        self.update_high_qc(qc, certified_height);
        if self.i_am(self.validators.leader(certified_height + 1)) {
            if certified_height + 1 > self.view {
                self.view = certified_height + 1;
            }
            self.pacemaker.restart();
            self.propose()?;
        }
        Ok(())
    }

    fn on_receive_new_view(&mut self, origin: &[u8], qc: QuorumCert) -> Result<(), DriverError> {
        if qc.validate(&self.validators).is_err() {
            log::debug!("dropping new-view, origin: {}", short_hash(origin));
            return Ok(());
        }
        let certified_height = match self.lookup_block(&qc.block_hash)? {
            Some(block) => block.height,
            None => return Ok(()),
        };
        log::debug!(
            "received new-view, origin: {}, certified height: {}",
            short_hash(origin),
            certified_height
        );
        self.update_high_qc(qc, certified_height);
        if self.i_am(self.validators.leader(self.view)) && self.proposed_view < self.view {
            self.propose()?;
        }
        Ok(())
    }

    fn on_view_timeout(&mut self) -> Result<(), DriverError> {
        self.view += 1;
        log::debug!("view timeout, advancing to view: {}", self.view);
        let leader = self.validators.leader(self.view).to_vec();
        self.pacemaker.restart();
        if self.i_am(&leader) {
            self.propose()?;
        } else {
            self.network
                .send(&leader, Envelope::NewView(self.high_qc.clone()));
        }
        Ok(())
    }

    /// Build and broadcast a block on top of the highest certificate. The batch bodies are
    /// broadcast first so every voter can execute the block it votes for.
    fn propose(&mut self) -> Result<(), DriverError> {
        let parent = match self.lookup_block(&self.high_qc.block_hash)? {
            Some(parent) => parent,
            None => {
                log::warn!("cannot propose: highest certificate references an unknown block");
                return Ok(());
            }
        };
        thread::sleep(self.config.proposal_interval);
        self.proposed_view = self.view;

        let txs = self.pool.pop_for_proposal(self.config.batch_size);
        let exec_height = parent.height.saturating_sub(2);
        let state_root = match self.storage.get_block_by_height(exec_height)? {
            Some(executed) => self
                .storage
                .get_block_commit(&executed.hash)?
                .map(|commit| commit.merkle_root)
                .unwrap_or_default(),
            None => Vec::new(),
        };
        let block = Block::new(
            parent.height + 1,
            parent.hash,
            self.high_qc.clone(),
            exec_height,
            state_root,
            txs.iter().map(|tx| tx.hash).collect(),
            &self.keypair,
        );
        log::debug!(
            "propose, block: {}, height: {}, txs: {}",
            short_hash(&block.hash.bytes()),
            block.height,
            txs.len(),
        );
        if !txs.is_empty() {
            self.network.broadcast(Envelope::TxList(TxList::new(txs)));
        }
        self.network.broadcast(Envelope::Proposal(block.clone()));
        // Handle the own proposal directly instead of relying on loopback delivery.
        self.on_receive_proposal(block)
    }

    fn update_high_qc(&mut self, qc: QuorumCert, certified_height: u64) {
        if certified_height > self.high_qc_height {
            log::debug!(
                "update highest certificate, block: {}, height: {}",
                short_hash(&qc.block_hash.bytes()),
                certified_height
            );
            self.high_qc = qc;
            self.high_qc_height = certified_height;
        }
    }

    // Whether `target` appears on `block`'s ancestor chain above the committed height.
    fn extends(&self, block: &Block, target: &CryptoHash) -> Result<bool, StorageError> {
        let committed = self.storage.get_block_height();
        let mut cursor = block.clone();
        loop {
            if cursor.hash == *target {
                return Ok(true);
            }
            if cursor.height <= committed {
                return Ok(false);
            }
            cursor = match self.lookup_block(&cursor.parent_hash)? {
                Some(parent) => parent,
                None => return Ok(false),
            };
        }
    }

    /// The three-chain commit rule: with `block.quorum_cert` proving its parent and the
    /// parent's certificate proving the grandparent, three blocks at consecutive heights
    /// on one parent chain commit everything up to the grandparent.
    fn try_commit(&mut self, block: &Block) -> Result<(), DriverError> {
        let parent = match self.lookup_block(&block.quorum_cert.block_hash)? {
            Some(parent) => parent,
            None => return Ok(()),
        };
        let grandparent = match self.lookup_block(&parent.quorum_cert.block_hash)? {
            Some(grandparent) => grandparent,
            None => return Ok(()),
        };
        let direct_chain = block.height == parent.height + 1
            && parent.height == grandparent.height + 1
            && block.parent_hash == parent.hash
            && parent.parent_hash == grandparent.hash;
        if direct_chain {
            self.commit_to(&grandparent, &parent.quorum_cert)?;
        }
        Ok(())
    }

    /// Execute and persist every uncommitted block up to `target`, ascending. `qc` is the
    /// certificate proving `target`.
    fn commit_to(&mut self, target: &Block, qc: &QuorumCert) -> Result<(), DriverError> {
        let committed = self.storage.get_block_height();
        if target.height <= committed {
            return Ok(());
        }

        // Walk parent links down to the committed head, then commit in ascending order.
        let mut chain: Vec<(Block, QuorumCert)> = Vec::new();
        let mut cursor = target.clone();
        let mut cursor_qc = qc.clone();
        while cursor.height > committed {
            let parent_hash = cursor.parent_hash;
            let parent_qc = cursor.quorum_cert.clone();
            chain.push((cursor, cursor_qc));
            cursor_qc = parent_qc;
            cursor = match self.lookup_block(&parent_hash)? {
                Some(parent) => parent,
                None => {
                    log::error!(
                        "cannot commit: missing ancestor {}",
                        short_hash(&parent_hash.bytes())
                    );
                    return Ok(());
                }
            };
        }
        chain.reverse();
        for (block, qc) in chain {
            self.execute_and_commit(block, qc)?;
        }
        Ok(())
    }

    fn execute_and_commit(&mut self, block: Block, qc: QuorumCert) -> Result<(), DriverError> {
        // Resolve bodies; transactions committed by an earlier block are skipped.
        let mut txs: Vec<Transaction> = Vec::with_capacity(block.transactions.len());
        let mut old_block_txs: Vec<CryptoHash> = Vec::new();
        for hash in &block.transactions {
            if self.storage.get_tx_commit(hash)?.is_some() {
                old_block_txs.push(*hash);
                continue;
            }
            let tx = match self.pool.get_tx(hash) {
                Some(tx) => Some(tx),
                None => self.storage.get_tx(hash)?,
            };
            match tx {
                Some(tx) => txs.push(tx),
                None => return Err(DriverError::TxNotFound(*hash)),
            }
        }

        let (block_commit, tx_commits) = self.executor.execute(&block, &txs, old_block_txs);
        let height = block.height;
        let block_hash = block.hash;
        let tx_hashes = block.transactions.clone();
        self.storage.commit(CommitData {
            block,
            qc,
            transactions: txs,
            block_commit,
            tx_commits,
        })?;
        self.pool.mark_committed(&tx_hashes);
        self.votes.forget(&block_hash);
        self.window.retain(|_, kept| kept.height > height);

        log::info!(
            "commit block, height: {}, block: {}, txs: {}",
            height,
            short_hash(&block_hash.bytes()),
            tx_hashes.len(),
        );
        Ok(())
    }
}

/// Run `driver` on its own thread until `shutdown` fires or a fatal error stops it.
///
/// The driver blocks on the inbound channel with the pacemaker's deadline; in-flight
/// messages left in the channel at shutdown are dropped, not persisted.
pub fn start_driver<K: KVStore, N: Network>(
    mut driver: Driver<K, N>,
    inbox: Receiver<(Vec<u8>, Envelope)>,
    shutdown: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let first_view = driver.storage.get_block_height() + 1;
        if let Err(err) = driver.start_view(first_view) {
            log::error!("consensus halted: {}", err);
            return;
        }
        loop {
            match shutdown.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => return,
                Err(TryRecvError::Empty) => (),
            }

            let step = match inbox.recv_timeout(driver.pacemaker.remaining()) {
                Ok((origin, envelope)) => driver.handle(&origin, envelope),
                Err(RecvTimeoutError::Timeout) => driver.on_view_timeout(),
                Err(RecvTimeoutError::Disconnected) => return,
            };
            if let Err(err) = step {
                log::error!("consensus halted: {}", err);
                return;
            }
        }
    })
}
