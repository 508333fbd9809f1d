//! Election phase and round counter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The ledger-wide election phase.
///
/// Advances monotonically `Commit → Reveal → Finished` within a round and
/// only returns to `Commit` through an explicit reset from `Finished`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Voters submit hidden vote commitments.
    Commit,
    /// Voters disclose candidate + salt; the ledger tallies.
    Reveal,
    /// The round is closed; results are final until reset.
    Finished,
}

impl Phase {
    /// The forward transition out of this phase, if any.
    ///
    /// `Finished` has no forward transition; leaving it requires an
    /// explicit reset.
    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Commit => Some(Phase::Reveal),
            Phase::Reveal => Some(Phase::Finished),
            Phase::Finished => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Commit => "commit",
            Phase::Reveal => "reveal",
            Phase::Finished => "finished",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Monotonic round counter, incremented by each election reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoundId(u64);

impl RoundId {
    pub const FIRST: Self = Self(0);

    pub fn new(round: u64) -> Self {
        Self(round)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
