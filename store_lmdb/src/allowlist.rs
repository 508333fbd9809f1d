//! LMDB implementation of AllowlistStore.
//!
//! Two databases: an append-only log keyed by big-endian sequence number
//! (so iteration order is admission order) and a membership index keyed by
//! identifier. Both are written in the same transaction.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use veil_store::allowlist::AllowlistStore;
use veil_store::StoreError;
use veil_types::VoterId;

use crate::LmdbError;

pub struct LmdbAllowlistStore {
    pub(crate) env: Arc<Env>,
    pub(crate) log_db: Database<Bytes, Bytes>,
    pub(crate) members_db: Database<Bytes, Bytes>,
}

impl AllowlistStore for LmdbAllowlistStore {
    fn admit(&self, voter: &VoterId) -> Result<bool, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let already = self
            .members_db
            .get(&wtxn, voter.as_bytes())
            .map_err(LmdbError::from)?
            .is_some();
        if already {
            return Ok(false);
        }
        let seq = self.log_db.len(&wtxn).map_err(LmdbError::from)?;
        self.log_db
            .put(&mut wtxn, &seq.to_be_bytes(), voter.as_bytes())
            .map_err(LmdbError::from)?;
        self.members_db
            .put(&mut wtxn, voter.as_bytes(), &[])
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }

    fn contains(&self, voter: &VoterId) -> Result<bool, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self
            .members_db
            .get(&rtxn, voter.as_bytes())
            .map_err(LmdbError::from)?
            .is_some())
    }

    fn snapshot(&self) -> Result<Vec<VoterId>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut voters = Vec::new();
        let iter = self.log_db.iter(&rtxn).map_err(LmdbError::from)?;
        for result in iter {
            let (_, val) = result.map_err(LmdbError::from)?;
            let raw = std::str::from_utf8(val)
                .map_err(|e| LmdbError::Serialization(e.to_string()))?;
            let voter = VoterId::parse(raw)
                .map_err(|e| LmdbError::Serialization(e.to_string()))?;
            voters.push(voter);
        }
        Ok(voters)
    }

    fn len(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.log_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}
