//! Merkle-style eligibility accumulator.
//!
//! A binary accumulator over hashed voter identifiers. Sibling pairs are
//! sorted byte-lexicographically before hashing, so proofs carry no position
//! bits and two parties holding the same identifier set always derive the
//! same root. Leaves are sorted and deduplicated for the same reason.

use serde::{Deserialize, Serialize};
use veil_types::{RootHash, VoterId};

use crate::hash::{blake2b_256_multi, voter_leaf};

/// Ordered sibling path proving an identifier's inclusion under a root.
///
/// A singleton set proves with an empty path (the leaf is the root).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipProof {
    siblings: Vec<[u8; 32]>,
}

impl MembershipProof {
    pub fn from_siblings(siblings: Vec<[u8; 32]>) -> Self {
        Self { siblings }
    }

    pub fn siblings(&self) -> &[[u8; 32]] {
        &self.siblings
    }

    pub fn len(&self) -> usize {
        self.siblings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.siblings.is_empty()
    }
}

/// Hash an internal node from its two children, sorted.
fn hash_pair(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    if a <= b {
        blake2b_256_multi(&[a, b])
    } else {
        blake2b_256_multi(&[b, a])
    }
}

/// The eligibility accumulator: builds the tree once over a snapshot of the
/// allow-list and serves proofs against the resulting root.
///
/// Building is O(n log n); proving and verifying are O(log n). An odd
/// trailing node at any level is promoted to the next level unchanged.
#[derive(Clone, Debug)]
pub struct EligibilityAccumulator {
    /// levels[0] is the sorted, deduplicated leaf row; the last level is the
    /// root row (empty when the identifier set is empty).
    levels: Vec<Vec<[u8; 32]>>,
}

impl EligibilityAccumulator {
    /// Build the accumulator over a set of identifiers.
    ///
    /// Duplicates collapse to one leaf, so the root is independent of both
    /// insertion order and multiplicity.
    pub fn build<'a, I>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = &'a VoterId>,
    {
        let mut leaves: Vec<[u8; 32]> = identifiers.into_iter().map(voter_leaf).collect();
        leaves.sort_unstable();
        leaves.dedup();

        if leaves.is_empty() {
            return Self { levels: Vec::new() };
        }

        let mut levels = vec![leaves];
        while levels.last().map(Vec::len).unwrap_or(0) > 1 {
            let prev = levels.last().expect("non-empty levels");
            let mut next = Vec::with_capacity(prev.len().div_ceil(2));
            for pair in prev.chunks(2) {
                match pair {
                    [left, right] => next.push(hash_pair(left, right)),
                    [odd] => next.push(*odd),
                    _ => unreachable!("chunks(2) yields 1 or 2 elements"),
                }
            }
            levels.push(next);
        }
        Self { levels }
    }

    /// The accumulator root. The empty set has the all-zero sentinel root,
    /// under which nothing is provable.
    pub fn root(&self) -> RootHash {
        match self.levels.last().and_then(|row| row.first()) {
            Some(root) => RootHash::new(*root),
            None => RootHash::ZERO,
        }
    }

    /// Number of distinct identifiers in the accumulator.
    pub fn len(&self) -> usize {
        self.levels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Produce the sibling path for an identifier, or `None` if it is not a
    /// member.
    pub fn prove(&self, identifier: &VoterId) -> Option<MembershipProof> {
        let leaves = self.levels.first()?;
        let leaf = voter_leaf(identifier);
        let mut index = leaves.binary_search(&leaf).ok()?;

        let mut siblings = Vec::new();
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = index ^ 1;
            if sibling < level.len() {
                siblings.push(level[sibling]);
            }
            // An odd node without a sibling is promoted; the path is
            // unchanged at this level.
            index /= 2;
        }
        Some(MembershipProof { siblings })
    }
}

/// Recompute the root from an identifier and a sibling path and compare.
///
/// Never errors: a structurally malformed proof is simply a non-member
/// result, so callers cannot distinguish "bad proof" from "not eligible".
/// The all-zero sentinel root admits nothing.
pub fn verify_membership(identifier: &VoterId, proof: &MembershipProof, root: &RootHash) -> bool {
    if root.is_zero() {
        return false;
    }
    let mut acc = voter_leaf(identifier);
    for sibling in &proof.siblings {
        acc = hash_pair(&acc, sibling);
    }
    &acc == root.as_bytes()
}
