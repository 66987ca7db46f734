/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The static, ordered validator set.
//!
//! The set is fixed for the lifetime of a run and must be configured identically (same keys,
//! same order) on every replica: leader rotation is positional, so disagreeing on the order
//! means disagreeing on who proposes.

use std::collections::HashMap;

/// Identities of the replicas eligible to propose and vote.
#[derive(Clone)]
pub struct ValidatorSet {
    // Public keys in the operator-configured order. Rotation indexes into this.
    validators: Vec<Vec<u8>>,
    index: HashMap<Vec<u8>, usize>,
}

impl ValidatorSet {
    /// Create a validator set from public keys in rotation order.
    pub fn new(validators: Vec<Vec<u8>>) -> ValidatorSet {
        let index = validators
            .iter()
            .enumerate()
            .map(|(i, key)| (key.clone(), i))
            .collect();
        Self { validators, index }
    }

    /// Whether `pubkey` belongs to the validator set.
    pub fn contains(&self, pubkey: &[u8]) -> bool {
        self.index.contains_key(pubkey)
    }

    /// The position of `pubkey` in rotation order, if it is a validator.
    pub fn position(&self, pubkey: &[u8]) -> Option<usize> {
        self.index.get(pubkey).copied()
    }

    /// The number of validators.
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// The number of signatures a quorum certificate must carry.
    ///
    /// With `f = (N - 1) / 3` tolerated faults, the threshold is `N - f`.
    pub fn quorum(&self) -> usize {
        let n = self.validators.len();
        n - (n - 1) / 3
    }

    /// The leader of `view`: round-robin over the configured order.
    pub fn leader(&self, view: u64) -> &[u8] {
        &self.validators[(view % self.validators.len() as u64) as usize]
    }

    /// Iterate over the validators in rotation order.
    pub fn iter(&self) -> std::slice::Iter<'_, Vec<u8>> {
        self.validators.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quorum_thresholds() {
        for (n, want) in [(1, 1), (2, 2), (3, 3), (4, 3), (5, 4), (6, 5), (7, 5), (10, 7)] {
            let vs = ValidatorSet::new((0..n).map(|i| vec![i as u8]).collect());
            assert_eq!(want, vs.quorum(), "n = {}", n);
        }
    }

    #[test]
    fn leader_rotation_wraps() {
        let vs = ValidatorSet::new((0..4).map(|i| vec![i as u8]).collect());
        assert_eq!(&[0u8][..], vs.leader(0));
        assert_eq!(&[3u8][..], vs.leader(3));
        assert_eq!(&[1u8][..], vs.leader(5));
        assert_eq!(&[2u8][..], vs.leader(4 * 1000 + 2));
    }
}
