/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The tree algorithm: incremental update and point verification.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use num_bigint::BigUint;
use sha3::Digest;

use super::store::{MerkleStore, Node, Position};

/// The nodes recomputed by one [`Tree::update`], together with the tree metadata after the
/// update. The caller persists all of it atomically; `update` itself never writes.
///
/// The root node appears both in `branches` and, for convenience, in `root`. `root` is
/// `None` only when `update` was called with no changed leaves.
pub struct UpdateResult {
    pub leaves: Vec<Node>,
    pub branches: Vec<Node>,
    pub leaf_count: BigUint,
    pub height: u8,
    pub root: Option<Node>,
}

/// A sparse Merkle tree over a backing store.
///
/// Generic over the hash function; one function governs the whole tree. The branch factor
/// is clamped to at least 2.
pub struct Tree<S: MerkleStore, H: Digest> {
    store: S,
    branch_factor: u8,
    _hash: PhantomData<H>,
}

impl<S: MerkleStore, H: Digest> Tree<S, H> {
    pub fn new(store: S, branch_factor: u8) -> Tree<S, H> {
        Tree {
            store,
            branch_factor: branch_factor.max(2),
            _hash: PhantomData,
        }
    }

    pub fn branch_factor(&self) -> u8 {
        self.branch_factor
    }

    /// The current root node, or `None` if the tree is empty.
    pub fn root(&self) -> Option<Node> {
        let height = self.store.get_height();
        if height == 0 {
            return None;
        }
        let position = Position::new(height, BigUint::default());
        let data = self.store.get_node(&position)?;
        Some(Node::new(position, data))
    }

    /// Recompute every ancestor touched by the changed `leaves`, given that the tree now
    /// holds `leaf_count` leaves in total.
    ///
    /// Pure with respect to the store: siblings outside the changed set are read from it,
    /// nothing is written. Each leaf index must be below `leaf_count`. If the same position
    /// appears twice the last entry wins. With no changed leaves the result simply restates
    /// the stored metadata and root.
    pub fn update(&self, leaves: Vec<Node>, leaf_count: BigUint) -> UpdateResult {
        if leaves.is_empty() {
            return UpdateResult {
                leaves,
                branches: Vec::new(),
                leaf_count: self.store.get_leaf_count(),
                height: self.store.get_height(),
                root: self.root(),
            };
        }

        let height = tree_height(self.branch_factor, &leaf_count);
        let branches = self.compute_branches(&leaves, height);
        let root = branches.last().cloned();

        UpdateResult {
            leaves,
            branches,
            leaf_count,
            height,
            root,
        }
    }

    /// Check `leaves` against the stored root.
    ///
    /// Recomputes the paths from the given leaves to the top, filling in siblings from the
    /// store, and succeeds iff the recomputed top node equals the stored root. Fails for an
    /// empty input, for nodes not at level 0, for indices at or beyond the stored leaf
    /// count, and for an empty tree.
    pub fn verify(&self, leaves: &[Node]) -> bool {
        if leaves.is_empty() {
            return false;
        }
        let root = match self.root() {
            Some(root) => root,
            None => return false,
        };
        let leaf_count = self.store.get_leaf_count();
        for leaf in leaves {
            if leaf.position.level() != 0 || *leaf.position.index() >= leaf_count {
                return false;
            }
        }
        let recomputed = self.compute_branches(leaves, self.store.get_height());
        match recomputed.last() {
            Some(top) => *top == root,
            None => false,
        }
    }

    // Hash level by level from the dirty set up to the single node at `height`, returning
    // the recomputed branches in (level, index) order. Children absent from both the dirty
    // set and the store contribute no bytes to their parent's preimage.
    fn compute_branches(&self, leaves: &[Node], height: u8) -> Vec<Node> {
        let branch = BigUint::from(self.branch_factor);
        let mut current: BTreeMap<BigUint, Vec<u8>> = leaves
            .iter()
            .map(|node| (node.position.index().clone(), node.data.clone()))
            .collect();
        let mut branches = Vec::new();

        let mut level: u8 = 0;
        while level < height {
            let mut parent_indexes: Vec<BigUint> =
                current.keys().map(|index| index / &branch).collect();
            parent_indexes.dedup();

            let mut parents: BTreeMap<BigUint, Vec<u8>> = BTreeMap::new();
            for parent in parent_indexes {
                let mut hasher = H::new();
                for child in 0..self.branch_factor {
                    let child_index = &parent * &branch + BigUint::from(child);
                    if let Some(data) = current.get(&child_index) {
                        hasher.update(data);
                    } else if let Some(data) = self
                        .store
                        .get_node(&Position::new(level, child_index))
                    {
                        hasher.update(&data);
                    }
                }
                parents.insert(parent, hasher.finalize().to_vec());
            }

            for (index, data) in &parents {
                branches.push(Node::new(Position::new(level + 1, index.clone()), data.clone()));
            }
            current = parents;
            level += 1;
        }

        branches
    }
}

/// The level of the root for a tree of `leaf_count` leaves: the smallest `h >= 1` with
/// `branch_factor^h >= leaf_count`.
pub fn tree_height(branch_factor: u8, leaf_count: &BigUint) -> u8 {
    let one = BigUint::from(1u8);
    if *leaf_count <= one {
        return 1;
    }
    let branch = BigUint::from(branch_factor);
    let mut power = branch.clone();
    let mut height: u8 = 1;
    while power < *leaf_count {
        power *= &branch;
        height += 1;
    }
    height
}
