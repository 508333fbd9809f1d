//! Fundamental types for the VEIL election engine.
//!
//! This crate defines the core types shared across every other crate in the
//! workspace: digests, voter identifiers, candidates, the election phase
//! enum, round counters, and timestamps.

pub mod candidate;
pub mod digest;
pub mod phase;
pub mod time;
pub mod voter;

pub use candidate::{Candidate, CandidateId};
pub use digest::{CommitHash, RootHash, TxId};
pub use phase::{Phase, RoundId};
pub use time::Timestamp;
pub use voter::{VoterId, VoterIdError};
