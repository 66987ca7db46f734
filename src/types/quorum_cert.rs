/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Votes and quorum certificates.

use std::collections::HashSet;

use borsh::{BorshDeserialize, BorshSerialize};

use super::basic::CryptoHash;
use super::keypair::{verify_bytes, Keypair};
use super::validator_set::ValidatorSet;
use super::ValidationError;

/// A public key together with a signature it produced.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Signature {
    pub pubkey: Vec<u8>,
    pub value: Vec<u8>,
}

impl Signature {
    /// Whether `value` is a valid signature by `pubkey` over `message`.
    pub fn verify(&self, message: &[u8]) -> bool {
        verify_bytes(&self.pubkey, message, &self.value)
    }
}

/// A validator's vote for a block: a signature over the block hash.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Vote {
    pub block_hash: CryptoHash,
    pub signature: Signature,
}

impl Vote {
    pub fn new(block_hash: CryptoHash, signer: &Keypair) -> Vote {
        Vote {
            block_hash,
            signature: Signature {
                pubkey: signer.public_bytes(),
                value: signer.sign(&block_hash.bytes()),
            },
        }
    }

    /// A vote is valid iff its signer is a validator and the signature verifies over the
    /// block hash.
    pub fn validate(&self, validators: &ValidatorSet) -> Result<(), ValidationError> {
        if self.signature.pubkey.is_empty() || self.signature.value.is_empty() {
            return Err(ValidationError::NilObject);
        }
        if !validators.contains(&self.signature.pubkey) {
            return Err(ValidationError::InvalidValidator);
        }
        if !self.signature.verify(&self.block_hash.bytes()) {
            return Err(ValidationError::InvalidSignature);
        }
        Ok(())
    }
}

/// Proof that a quorum of validators voted for a block.
///
/// Signatures are canonicalized on [`build`](Self::build) by sorting lexicographically on
/// the signer public key, so the same set of votes serializes identically on every replica.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct QuorumCert {
    pub block_hash: CryptoHash,
    pub signatures: Vec<Signature>,
}

impl QuorumCert {
    /// The certificate embedded in the first block after genesis. It references the
    /// genesis block with the zero hash and carries no signatures; validation accepts it
    /// as a special case.
    pub fn genesis() -> QuorumCert {
        QuorumCert {
            block_hash: CryptoHash::zero(),
            signatures: Vec::new(),
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.block_hash.is_zero() && self.signatures.is_empty()
    }

    /// Assemble a certificate for `block_hash` from `votes`.
    ///
    /// Votes for other blocks are ignored. Duplicate signers are kept; [`validate`]
    /// (Self::validate) rejects certificates containing them, so callers collecting votes
    /// must deduplicate by signer.
    pub fn build(block_hash: CryptoHash, votes: &[Vote]) -> QuorumCert {
        let mut signatures: Vec<Signature> = votes
            .iter()
            .filter(|vote| vote.block_hash == block_hash)
            .map(|vote| vote.signature.clone())
            .collect();
        signatures.sort_by(|a, b| a.pubkey.cmp(&b.pubkey));
        QuorumCert {
            block_hash,
            signatures,
        }
    }

    /// Check that the certificate proves a quorum: at least `validators.quorum()` pairwise
    /// distinct validator signatures, each verifying over the block hash.
    pub fn validate(&self, validators: &ValidatorSet) -> Result<(), ValidationError> {
        if self.is_genesis() {
            return Ok(());
        }
        if self.signatures.len() < validators.quorum() {
            return Err(ValidationError::InsufficientSignatures);
        }
        let mut seen: HashSet<&[u8]> = HashSet::with_capacity(self.signatures.len());
        for signature in &self.signatures {
            if signature.pubkey.is_empty() || signature.value.is_empty() {
                return Err(ValidationError::NilObject);
            }
            if !validators.contains(&signature.pubkey) {
                return Err(ValidationError::InvalidValidator);
            }
            if !seen.insert(&signature.pubkey) {
                return Err(ValidationError::DuplicateSigner);
            }
            if !signature.verify(&self.block_hash.bytes()) {
                return Err(ValidationError::InvalidSignature);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Vec<Keypair>, ValidatorSet, CryptoHash, Vec<Vote>) {
        let keys: Vec<Keypair> = (0..5).map(|_| Keypair::generate()).collect();
        let validators = ValidatorSet::new(keys[..4].iter().map(|k| k.public_bytes()).collect());
        let block_hash = CryptoHash::new([1u8; 32]);
        let votes = keys.iter().map(|k| Vote::new(block_hash, k)).collect();
        (keys, validators, block_hash, votes)
    }

    #[test]
    fn quorum_of_three_out_of_four_validates() {
        let (_, validators, hash, votes) = setup();
        let qc = QuorumCert::build(hash, &[votes[2].clone(), votes[1].clone(), votes[0].clone()]);
        assert!(qc.validate(&validators).is_ok());

        let full = QuorumCert::build(hash, &votes[..4]);
        assert!(full.validate(&validators).is_ok());
    }

    #[test]
    fn two_votes_are_not_enough() {
        let (_, validators, hash, votes) = setup();
        let qc = QuorumCert::build(hash, &[votes[1].clone(), votes[0].clone()]);
        assert_eq!(
            Err(ValidationError::InsufficientSignatures),
            qc.validate(&validators)
        );
    }

    #[test]
    fn nil_signature_vote_fails() {
        let (_, validators, hash, votes) = setup();
        let nil_vote = Vote {
            block_hash: hash,
            signature: Signature {
                pubkey: Vec::new(),
                value: Vec::new(),
            },
        };
        let qc = QuorumCert::build(
            hash,
            &[votes[2].clone(), votes[3].clone(), nil_vote, votes[0].clone()],
        );
        assert_eq!(Err(ValidationError::NilObject), qc.validate(&validators));
    }

    #[test]
    fn duplicate_signer_fails() {
        let (_, validators, hash, votes) = setup();
        let qc = QuorumCert::build(
            hash,
            &[
                votes[2].clone(),
                votes[3].clone(),
                votes[0].clone(),
                votes[2].clone(),
            ],
        );
        assert_eq!(Err(ValidationError::DuplicateSigner), qc.validate(&validators));
    }

    #[test]
    fn non_validator_signer_fails() {
        let (_, validators, hash, votes) = setup();
        let qc = QuorumCert::build(
            hash,
            &[
                votes[1].clone(),
                votes[3].clone(),
                votes[0].clone(),
                votes[4].clone(),
            ],
        );
        assert_eq!(Err(ValidationError::InvalidValidator), qc.validate(&validators));
    }

    #[test]
    fn forged_signature_fails() {
        let (keys, validators, hash, votes) = setup();
        let forged = Vote {
            block_hash: hash,
            signature: Signature {
                pubkey: keys[1].public_bytes(),
                value: keys[0].sign(&hash.bytes()),
            },
        };
        let qc = QuorumCert::build(hash, &[votes[2].clone(), votes[3].clone(), forged]);
        assert_eq!(Err(ValidationError::InvalidSignature), qc.validate(&validators));
    }

    #[test]
    fn build_is_canonical_in_vote_order() {
        let (_, _, hash, votes) = setup();
        let a = QuorumCert::build(hash, &[votes[2].clone(), votes[0].clone(), votes[1].clone()]);
        let b = QuorumCert::build(hash, &[votes[0].clone(), votes[1].clone(), votes[2].clone()]);
        assert_eq!(a.try_to_vec().unwrap(), b.try_to_vec().unwrap());
    }

    #[test]
    fn genesis_certificate_always_validates() {
        let (_, validators, _, _) = setup();
        assert!(QuorumCert::genesis().validate(&validators).is_ok());
    }

    #[test]
    fn borsh_round_trip() {
        let (_, _, hash, votes) = setup();
        let qc = QuorumCert::build(hash, &votes[..3]);
        let bytes = qc.try_to_vec().unwrap();
        assert_eq!(qc, QuorumCert::deserialize(&mut bytes.as_slice()).unwrap());
    }
}
