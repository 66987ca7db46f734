/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the 'block' type and its methods.

use borsh::{BorshDeserialize, BorshSerialize};

use super::basic::{CryptoHash, CryptoHasher, Digest};
use super::keypair::{verify_bytes, Keypair};
use super::quorum_cert::{QuorumCert, Vote};
use super::validator_set::ValidatorSet;
use super::ValidationError;

/// A proposed or committed block, immutable once signed by its proposer.
///
/// `exec_height` names the committed ancestor whose post-execution Merkle root is recorded
/// in `state_root`; execution trails proposals by two heights so the root is always known
/// when the block is built. `transactions` holds hashes only; the bodies travel separately.
///
/// # Canonical hash
///
/// `hash = sha3_256(be64(height) ∥ parent_hash ∥ proposer ∥ qc.block_hash ∥
/// be64(exec_height) ∥ state_root ∥ tx_hash_0 ∥ … ∥ tx_hash_n)`. The signature is over the
/// 32 hash bytes.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Block {
    pub height: u64,
    pub hash: CryptoHash,
    pub parent_hash: CryptoHash,
    pub proposer: Vec<u8>,
    pub quorum_cert: QuorumCert,
    pub exec_height: u64,
    pub state_root: Vec<u8>,
    pub transactions: Vec<CryptoHash>,
    pub signature: Vec<u8>,
}

impl Block {
    /// Build and sign a block. The proposer is the keypair's public key.
    pub fn new(
        height: u64,
        parent_hash: CryptoHash,
        quorum_cert: QuorumCert,
        exec_height: u64,
        state_root: Vec<u8>,
        transactions: Vec<CryptoHash>,
        signer: &Keypair,
    ) -> Block {
        let proposer = signer.public_bytes();
        let hash = Block::sum(
            height,
            &parent_hash,
            &proposer,
            &quorum_cert,
            exec_height,
            &state_root,
            &transactions,
        );
        let signature = signer.sign(&hash.bytes());
        Block {
            height,
            hash,
            parent_hash,
            proposer,
            quorum_cert,
            exec_height,
            state_root,
            transactions,
            signature,
        }
    }

    /// The deterministic genesis block shared by all replicas: height 0, no proposer, the
    /// genesis certificate, and an empty state root.
    ///
    /// Its hash is the zero hash rather than a recomputation, so that the genesis
    /// certificate (which references the zero hash) resolves to it. The genesis block is
    /// committed at initialization and never validated.
    pub fn genesis() -> Block {
        Block {
            height: 0,
            hash: CryptoHash::zero(),
            parent_hash: CryptoHash::zero(),
            proposer: Vec::new(),
            quorum_cert: QuorumCert::genesis(),
            exec_height: 0,
            state_root: Vec::new(),
            transactions: Vec::new(),
            signature: Vec::new(),
        }
    }

    /// The canonical hash over the given fields.
    pub fn sum(
        height: u64,
        parent_hash: &CryptoHash,
        proposer: &[u8],
        quorum_cert: &QuorumCert,
        exec_height: u64,
        state_root: &[u8],
        transactions: &[CryptoHash],
    ) -> CryptoHash {
        let mut hasher = CryptoHasher::new();
        hasher.update(height.to_be_bytes());
        hasher.update(parent_hash.bytes());
        hasher.update(proposer);
        hasher.update(quorum_cert.block_hash.bytes());
        hasher.update(exec_height.to_be_bytes());
        hasher.update(state_root);
        for tx_hash in transactions {
            hasher.update(tx_hash.bytes());
        }
        CryptoHash::new(hasher.finalize().into())
    }

    /// Recompute the hash from this block's own fields.
    pub fn resum(&self) -> CryptoHash {
        Block::sum(
            self.height,
            &self.parent_hash,
            &self.proposer,
            &self.quorum_cert,
            self.exec_height,
            &self.state_root,
            &self.transactions,
        )
    }

    /// Full validation of a received proposal: the embedded certificate, the hash, the
    /// proposer's membership, and the proposer's signature.
    pub fn validate(&self, validators: &ValidatorSet) -> Result<(), ValidationError> {
        self.quorum_cert.validate(validators)?;
        if self.resum() != self.hash {
            return Err(ValidationError::InvalidHash);
        }
        if !validators.contains(&self.proposer) {
            return Err(ValidationError::InvalidValidator);
        }
        if !verify_bytes(&self.proposer, &self.hash.bytes(), &self.signature) {
            return Err(ValidationError::InvalidSignature);
        }
        Ok(())
    }

    /// Create this replica's vote for the block.
    pub fn vote(&self, signer: &Keypair) -> Vote {
        Vote::new(self.hash, signer)
    }
}
