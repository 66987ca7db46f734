/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Client transactions and their canonical hash.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use super::base64_bytes;
use super::basic::{CryptoHash, CryptoHasher, Digest};
use super::keypair::{verify_bytes, Keypair};
use super::ValidationError;

/// A signed client transaction, immutable once signed.
///
/// `code_addr` is empty for chaincode deployments; calls carry the hash of the transaction
/// that deployed the code. `nonce` exists only to make otherwise-identical transactions
/// hash differently; it is not required to be monotonic.
///
/// # Canonical hash
///
/// `hash = sha3_256(be64(nonce) ∥ sender ∥ code_addr ∥ input)`, with the nonce encoded as
/// a big-endian two's complement `i64`. The signature is over the 32 hash bytes.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct Transaction {
    pub nonce: i64,
    #[serde(with = "base64_bytes")]
    pub sender: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub code_addr: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub input: Vec<u8>,
    pub hash: CryptoHash,
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
}

impl Transaction {
    /// Build and sign a transaction. The sender is the keypair's public key.
    pub fn new(nonce: i64, code_addr: Vec<u8>, input: Vec<u8>, signer: &Keypair) -> Transaction {
        let sender = signer.public_bytes();
        let hash = Transaction::sum(nonce, &sender, &code_addr, &input);
        let signature = signer.sign(&hash.bytes());
        Transaction {
            nonce,
            sender,
            code_addr,
            input,
            hash,
            signature,
        }
    }

    /// The canonical hash over the given fields.
    pub fn sum(nonce: i64, sender: &[u8], code_addr: &[u8], input: &[u8]) -> CryptoHash {
        let mut hasher = CryptoHasher::new();
        hasher.update(nonce.to_be_bytes());
        hasher.update(sender);
        hasher.update(code_addr);
        hasher.update(input);
        CryptoHash::new(hasher.finalize().into())
    }

    /// Recompute the hash from this transaction's own fields.
    pub fn resum(&self) -> CryptoHash {
        Transaction::sum(self.nonce, &self.sender, &self.code_addr, &self.input)
    }

    /// Check that the recorded hash recomputes and that the signature verifies under the
    /// sender key.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sender.is_empty() {
            return Err(ValidationError::NilObject);
        }
        if self.resum() != self.hash {
            return Err(ValidationError::InvalidHash);
        }
        if !verify_bytes(&self.sender, &self.hash.bytes(), &self.signature) {
            return Err(ValidationError::InvalidSignature);
        }
        Ok(())
    }
}

/// An ordered batch of transactions, exchanged between replicas so that voters hold the
/// bodies behind a proposal's transaction hashes.
#[derive(Clone, Debug, PartialEq, Eq, Default, BorshSerialize, BorshDeserialize)]
pub struct TxList(pub Vec<Transaction>);

impl TxList {
    pub fn new(transactions: Vec<Transaction>) -> TxList {
        TxList(transactions)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transaction> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_covers_every_field() {
        let signer = Keypair::generate();
        let tx = Transaction::new(7, vec![1, 2], vec![3, 4], &signer);

        assert_eq!(tx.hash, tx.resum());
        assert_ne!(tx.hash, Transaction::sum(8, &tx.sender, &tx.code_addr, &tx.input));
        assert_ne!(tx.hash, Transaction::sum(7, &[9], &tx.code_addr, &tx.input));
        assert_ne!(tx.hash, Transaction::sum(7, &tx.sender, &[1, 3], &tx.input));
        assert_ne!(tx.hash, Transaction::sum(7, &tx.sender, &tx.code_addr, &[3, 5]));
    }

    #[test]
    fn validate_accepts_signed_and_rejects_tampered() {
        let signer = Keypair::generate();
        let tx = Transaction::new(1, Vec::new(), b"deploy".to_vec(), &signer);
        assert!(tx.validate().is_ok());

        let mut wrong_hash = tx.clone();
        wrong_hash.input = b"other".to_vec();
        assert_eq!(Err(ValidationError::InvalidHash), wrong_hash.validate());

        let mut wrong_sig = tx.clone();
        wrong_sig.signature = Keypair::generate().sign(&tx.hash.bytes());
        assert_eq!(Err(ValidationError::InvalidSignature), wrong_sig.validate());

        let mut no_sender = tx;
        no_sender.sender = Vec::new();
        assert_eq!(Err(ValidationError::NilObject), no_sender.validate());
    }

    #[test]
    fn borsh_round_trip() {
        let signer = Keypair::generate();
        let tx = Transaction::new(-3, vec![0xAB; 32], vec![1; 8], &signer);
        let bytes = tx.try_to_vec().unwrap();
        assert_eq!(tx, Transaction::deserialize(&mut bytes.as_slice()).unwrap());

        let list = TxList::new(vec![tx.clone(), Transaction::new(4, Vec::new(), vec![], &signer)]);
        let bytes = list.try_to_vec().unwrap();
        assert_eq!(list, TxList::deserialize(&mut bytes.as_slice()).unwrap());
    }

    #[test]
    fn json_round_trip_uses_base64_fields() {
        let signer = Keypair::generate();
        let tx = Transaction::new(42, vec![5; 32], b"{}".to_vec(), &signer);
        let json = serde_json::to_string(&tx).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, back);
        assert!(back.validate().is_ok());
    }
}
