//! LMDB implementation of ProjectionStore.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use veil_store::projection::{ProjectionSnapshot, ProjectionStore};
use veil_store::StoreError;

use crate::LmdbError;

pub struct LmdbProjectionStore {
    pub(crate) env: Arc<Env>,
    pub(crate) projections_db: Database<Bytes, Bytes>,
}

impl ProjectionStore for LmdbProjectionStore {
    fn load(&self, election_id: &str) -> Result<Option<ProjectionSnapshot>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let val = self
            .projections_db
            .get(&rtxn, election_id.as_bytes())
            .map_err(LmdbError::from)?;
        match val {
            Some(bytes) => {
                let snapshot = bincode::deserialize(bytes)
                    .map_err(|e| LmdbError::Serialization(e.to_string()))?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    fn save(&self, election_id: &str, snapshot: &ProjectionSnapshot) -> Result<(), StoreError> {
        let bytes = bincode::serialize(snapshot)
            .map_err(|e| LmdbError::Serialization(e.to_string()))?;
        // Single write transaction: counters and offset land together or
        // not at all.
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.projections_db
            .put(&mut wtxn, election_id.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;

    #[test]
    fn snapshot_roundtrip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path()).unwrap();
        let store = env.projection_store();

        assert!(store.load("e1").unwrap().is_none());

        let first = ProjectionSnapshot {
            committed_count: 2,
            revealed_count: 1,
            per_candidate_votes: vec![1, 0],
            last_processed_offset: Some(2),
        };
        store.save("e1", &first).unwrap();
        assert_eq!(store.load("e1").unwrap(), Some(first.clone()));

        let second = ProjectionSnapshot {
            committed_count: 5,
            revealed_count: 4,
            per_candidate_votes: vec![2, 2],
            last_processed_offset: Some(8),
        };
        store.save("e1", &second).unwrap();
        assert_eq!(store.load("e1").unwrap(), Some(second));
        assert!(store.load("other").unwrap().is_none());
    }

    #[test]
    fn snapshots_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let snap = ProjectionSnapshot {
            committed_count: 1,
            revealed_count: 0,
            per_candidate_votes: vec![0],
            last_processed_offset: Some(0),
        };
        {
            let env = LmdbEnvironment::open(dir.path()).unwrap();
            env.projection_store().save("e1", &snap).unwrap();
        }
        let env = LmdbEnvironment::open(dir.path()).unwrap();
        assert_eq!(env.projection_store().load("e1").unwrap(), Some(snap));
    }
}
