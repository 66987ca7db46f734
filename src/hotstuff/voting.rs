/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Vote accumulation into quorum certificates.

use std::collections::{HashMap, HashSet};

use crate::types::basic::CryptoHash;
use crate::types::quorum_cert::{QuorumCert, Vote};
use crate::types::validator_set::ValidatorSet;

/// Collects valid votes per block hash and emits a certificate exactly once when a block
/// reaches the quorum threshold.
///
/// Invalid votes (bad signature, non-validator signer) and duplicate votes from the same
/// signer are dropped.
pub(crate) struct VoteCollector {
    validators: ValidatorSet,
    votes: HashMap<CryptoHash, HashMap<Vec<u8>, Vote>>,
    certified: HashSet<CryptoHash>,
}

impl VoteCollector {
    pub(crate) fn new(validators: ValidatorSet) -> VoteCollector {
        VoteCollector {
            validators,
            votes: HashMap::new(),
            certified: HashSet::new(),
        }
    }

    /// Fold in one vote. Returns the assembled certificate if this vote completes the
    /// quorum for its block.
    pub(crate) fn collect(&mut self, vote: Vote) -> Option<QuorumCert> {
        if vote.validate(&self.validators).is_err() {
            return None;
        }
        if self.certified.contains(&vote.block_hash) {
            return None;
        }
        let block_hash = vote.block_hash;
        let entry = self.votes.entry(block_hash).or_default();
        entry.insert(vote.signature.pubkey.clone(), vote);
        if entry.len() < self.validators.quorum() {
            return None;
        }

        let votes: Vec<Vote> = entry.values().cloned().collect();
        self.votes.remove(&block_hash);
        self.certified.insert(block_hash);
        Some(QuorumCert::build(block_hash, &votes))
    }

    /// Drop bookkeeping for a block that has been committed or pruned.
    pub(crate) fn forget(&mut self, block_hash: &CryptoHash) {
        self.votes.remove(block_hash);
        self.certified.remove(block_hash);
    }
}
