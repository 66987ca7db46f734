/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The wire types of the chain and the rules that make them trustworthy: canonical hashing,
//! signatures, and validation against the validator set.
//!
//! Every type here is serialized with [Borsh](https://borsh.io), which is deterministic:
//! re-encoding a decoded value yields the same bytes. Hashes are computed over explicit
//! byte concatenations (documented per type), never over the Borsh encoding, so the hash
//! preimages are independent of the container format.

pub mod base64_bytes;

pub mod basic;

pub mod block;

pub mod commit;

pub mod keypair;

pub mod quorum_cert;

pub mod transaction;

pub mod validator_set;

use std::fmt::{self, Display, Formatter};

/// Reasons a received wire value is rejected.
///
/// Validation failures are not actionable by the local replica. Per the error policy of the
/// consensus driver, the offending message is dropped and at most logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is empty where content is mandatory.
    NilObject,
    /// The recorded hash does not match the recomputation over the canonical fields.
    InvalidHash,
    /// A signature is malformed or does not verify under its public key.
    InvalidSignature,
    /// The signer or proposer is not a member of the validator set.
    InvalidValidator,
    /// A quorum certificate carries fewer signatures than the quorum threshold.
    InsufficientSignatures,
    /// A quorum certificate carries two signatures from the same public key.
    DuplicateSigner,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::NilObject => write!(f, "empty field in signed object"),
            ValidationError::InvalidHash => write!(f, "invalid hash"),
            ValidationError::InvalidSignature => write!(f, "invalid signature"),
            ValidationError::InvalidValidator => write!(f, "signer is not a validator"),
            ValidationError::InsufficientSignatures => write!(f, "not enough signatures"),
            ValidationError::DuplicateSigner => write!(f, "duplicate signer"),
        }
    }
}
