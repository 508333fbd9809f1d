//! Candidate registry types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum accepted candidate name length (bytes).
pub const MAX_CANDIDATE_NAME_LEN: usize = 100;

/// Sequential candidate identifier.
///
/// Ids are assigned densely (id = count at creation time) and stay stable
/// for the lifetime of a round, so `id` doubles as the candidate's index
/// into the tally vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateId(u32);

impl CandidateId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Index into the dense tally/candidate vectors.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A candidate on the ballot.
///
/// Candidates are never physically removed during a round; removal marks
/// them inactive so ids stay dense and historical tallies keep their slots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_index_matches_value() {
        let id = CandidateId::new(7);
        assert_eq!(id.as_u32(), 7);
        assert_eq!(id.index(), 7);
    }
}
