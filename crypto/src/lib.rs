//! Cryptographic primitives for the VEIL election engine.
//!
//! - **Blake2b-256** for all digests (accumulator nodes, vote commitments)
//! - The canonical commit digest construction shared by commit and reveal
//! - The **eligibility accumulator**: a sorted-pair Merkle accumulator over
//!   voter identifiers with compact membership proofs

pub mod accumulator;
pub mod hash;

pub use accumulator::{verify_membership, EligibilityAccumulator, MembershipProof};
pub use hash::{blake2b_256, blake2b_256_multi, commit_digest, salt_digest, voter_leaf};
