//! Durable tally-projection storage.

use serde::{Deserialize, Serialize};

use crate::StoreError;

/// The materialized read-side state for one election's event log.
///
/// The snapshot is the unit of durability: counters and the scan offset are
/// always written together, so a crash between batches at worst re-processes
/// one batch against counters that never saw it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionSnapshot {
    /// Total commitments observed.
    pub committed_count: u64,
    /// Total reveals observed.
    pub revealed_count: u64,
    /// Votes per candidate id (dense, grows with CandidateAdded).
    pub per_candidate_votes: Vec<u64>,
    /// Offset of the last fully processed event, `None` before the first.
    pub last_processed_offset: Option<u64>,
}

impl ProjectionSnapshot {
    /// The offset the next scan should start from.
    pub fn next_offset(&self) -> u64 {
        self.last_processed_offset.map_or(0, |o| o + 1)
    }
}

/// Trait for persisting projection snapshots keyed by election id.
pub trait ProjectionStore: Send + Sync {
    /// Load the snapshot for an election, or `None` if never saved.
    fn load(&self, election_id: &str) -> Result<Option<ProjectionSnapshot>, StoreError>;

    /// Atomically replace the snapshot for an election.
    fn save(&self, election_id: &str, snapshot: &ProjectionSnapshot) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_offset_starts_at_zero() {
        assert_eq!(ProjectionSnapshot::default().next_offset(), 0);
        let snap = ProjectionSnapshot {
            last_processed_offset: Some(41),
            ..Default::default()
        };
        assert_eq!(snap.next_offset(), 42);
    }
}
