//! In-memory store implementations for tests and ephemeral deployments.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use veil_types::VoterId;

use crate::allowlist::AllowlistStore;
use crate::projection::{ProjectionSnapshot, ProjectionStore};
use crate::StoreError;

/// In-memory `ProjectionStore`.
#[derive(Default)]
pub struct MemoryProjectionStore {
    snapshots: Mutex<HashMap<String, ProjectionSnapshot>>,
}

impl MemoryProjectionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectionStore for MemoryProjectionStore {
    fn load(&self, election_id: &str) -> Result<Option<ProjectionSnapshot>, StoreError> {
        let snapshots = self.snapshots.lock().expect("projection lock poisoned");
        Ok(snapshots.get(election_id).cloned())
    }

    fn save(&self, election_id: &str, snapshot: &ProjectionSnapshot) -> Result<(), StoreError> {
        let mut snapshots = self.snapshots.lock().expect("projection lock poisoned");
        snapshots.insert(election_id.to_string(), snapshot.clone());
        Ok(())
    }
}

/// In-memory `AllowlistStore`.
#[derive(Default)]
pub struct MemoryAllowlistStore {
    inner: Mutex<AllowlistInner>,
}

#[derive(Default)]
struct AllowlistInner {
    log: Vec<VoterId>,
    members: HashSet<VoterId>,
}

impl MemoryAllowlistStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AllowlistStore for MemoryAllowlistStore {
    fn admit(&self, voter: &VoterId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().expect("allowlist lock poisoned");
        if inner.members.contains(voter) {
            return Ok(false);
        }
        inner.members.insert(voter.clone());
        inner.log.push(voter.clone());
        Ok(true)
    }

    fn contains(&self, voter: &VoterId) -> Result<bool, StoreError> {
        let inner = self.inner.lock().expect("allowlist lock poisoned");
        Ok(inner.members.contains(voter))
    }

    fn snapshot(&self) -> Result<Vec<VoterId>, StoreError> {
        let inner = self.inner.lock().expect("allowlist lock poisoned");
        Ok(inner.log.clone())
    }

    fn len(&self) -> Result<u64, StoreError> {
        let inner = self.inner.lock().expect("allowlist lock poisoned");
        Ok(inner.log.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voter(name: &str) -> VoterId {
        VoterId::parse(name).unwrap()
    }

    #[test]
    fn admit_is_idempotent() {
        let store = MemoryAllowlistStore::new();
        assert!(store.admit(&voter("alice")).unwrap());
        assert!(!store.admit(&voter("alice")).unwrap());
        assert_eq!(store.len().unwrap(), 1);
        assert!(store.contains(&voter("alice")).unwrap());
        assert!(!store.contains(&voter("bob")).unwrap());
    }

    #[test]
    fn snapshot_preserves_admission_order() {
        let store = MemoryAllowlistStore::new();
        store.admit(&voter("carol")).unwrap();
        store.admit(&voter("alice")).unwrap();
        store.admit(&voter("bob")).unwrap();
        assert_eq!(
            store.snapshot().unwrap(),
            vec![voter("carol"), voter("alice"), voter("bob")]
        );
    }

    #[test]
    fn projection_snapshots_roundtrip() {
        let store = MemoryProjectionStore::new();
        assert!(store.load("e1").unwrap().is_none());
        let snap = ProjectionSnapshot {
            committed_count: 3,
            revealed_count: 2,
            per_candidate_votes: vec![1, 1],
            last_processed_offset: Some(7),
        };
        store.save("e1", &snap).unwrap();
        assert_eq!(store.load("e1").unwrap(), Some(snap));
        assert!(store.load("e2").unwrap().is_none());
    }
}
