/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A sparse, position-addressed Merkle tree over the world state.
//!
//! Leaf slots are allocated to state keys on first write and never reused, so the tree only
//! ever grows. Nodes live in a backing store behind the [`store::MerkleStore`] trait;
//! [`tree::Tree::update`] is pure and returns the recomputed nodes for the caller to
//! persist, which lets the storage layer fold the tree update into the same atomic batch
//! as the state values it attests.

pub mod store;

pub mod tree;

pub use store::{MapStore, MerkleStore, Node, Position};
pub use tree::{Tree, UpdateResult};
