/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A consortium blockchain core: Byzantine Fault Tolerant state machine replication using
//! three-chain HotStuff consensus, with the committed world state attested by a sparse,
//! store-backed Merkle tree whose root is carried inside every block.
//!
//! The crate is organized around the consensus driver ([`hotstuff`]), the chain and state
//! storage ([`state`]), and the deterministic execution pipeline ([`execution`]). The
//! peer-to-peer transport is abstracted behind the [`networking::Network`] capability, and
//! [`node`] wires everything together into a running replica with an HTTP surface.

pub mod config;

pub mod execution;

pub mod hotstuff;

pub mod logging;

pub mod merkle;

pub mod networking;

pub mod node;

pub mod state;

pub mod txpool;

pub mod types;

// Re-exports of the handles most library users touch.
pub use config::Config;
pub use node::Node;
