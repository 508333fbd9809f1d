//! Blake2b hashing and the commit digest construction.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use veil_types::{CandidateId, CommitHash, VoterId};

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash a canonical voter identifier to its accumulator leaf.
pub fn voter_leaf(voter: &VoterId) -> [u8; 32] {
    blake2b_256(voter.as_bytes())
}

/// Hash a salt to the fixed-width word that enters the commit digest.
///
/// Salts are arbitrary byte strings; reducing them to 32 bytes first keeps
/// the commit preimage layout fixed regardless of salt length.
pub fn salt_digest(salt: &[u8]) -> [u8; 32] {
    blake2b_256(salt)
}

/// The canonical commit digest: `H( be32(candidate) || H(salt) )`.
///
/// The candidate id is widened to a 32-byte big-endian word so the preimage
/// is a fixed 64-byte layout with no encoding ambiguity between the typed
/// candidate word and the salt word. This is the single definition used both
/// when a voter constructs a commitment and when the ledger verifies a
/// reveal.
pub fn commit_digest(candidate: CandidateId, salt: &[u8]) -> CommitHash {
    let mut candidate_word = [0u8; 32];
    candidate_word[28..].copy_from_slice(&candidate.as_u32().to_be_bytes());
    CommitHash::new(blake2b_256_multi(&[&candidate_word, &salt_digest(salt)]))
}
