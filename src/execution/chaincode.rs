/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The chaincode capability: what a contract can see and do.
//!
//! A chaincode never touches storage directly. It reads and writes through a context whose
//! keys are scoped by the code address, so two contracts can never collide in the world
//! state.

use std::fmt::{self, Display, Formatter};

/// Read access during queries and invocations.
pub trait QueryContext {
    /// The opaque input carried by the transaction or query.
    fn input(&self) -> &[u8];

    /// Read a key of this chaincode's state.
    fn get_state(&self, key: &[u8]) -> Option<Vec<u8>>;
}

/// Full access during transaction execution.
pub trait CallContext: QueryContext {
    /// The public key of the transaction sender.
    fn sender(&self) -> &[u8];

    /// The height of the block being executed.
    fn block_height(&self) -> u64;

    /// Write a key of this chaincode's state. Visible to later reads in the same block;
    /// durable only if the transaction succeeds.
    fn set_state(&mut self, key: &[u8], value: Vec<u8>);
}

/// A contract. `init` runs once at deployment, `invoke` for every call transaction, and
/// `query` for read-only requests outside consensus.
pub trait Chaincode: Send + Sync {
    fn init(&self, ctx: &mut dyn CallContext) -> Result<(), ChaincodeError>;

    fn invoke(&self, ctx: &mut dyn CallContext) -> Result<(), ChaincodeError>;

    fn query(&self, ctx: &dyn QueryContext) -> Result<Vec<u8>, ChaincodeError>;
}

/// A contract-level failure. Recorded verbatim in the transaction's commit record; the
/// transaction's writes are discarded.
#[derive(Debug)]
pub struct ChaincodeError(pub String);

impl ChaincodeError {
    pub fn new(msg: impl Into<String>) -> ChaincodeError {
        ChaincodeError(msg.into())
    }
}

impl Display for ChaincodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<serde_json::Error> for ChaincodeError {
    fn from(err: serde_json::Error) -> Self {
        ChaincodeError(format!("bad input: {}", err))
    }
}
