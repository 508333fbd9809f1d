//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::allowlist::LmdbAllowlistStore;
use crate::projection::LmdbProjectionStore;
use crate::LmdbError;

/// Default map size: 64 MiB, far beyond what an election's bookkeeping needs.
const DEFAULT_MAP_SIZE: usize = 64 * 1024 * 1024;

const MAX_DBS: u32 = 4;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    projections_db: Database<Bytes, Bytes>,
    allowlist_log_db: Database<Bytes, Bytes>,
    allowlist_members_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    ///
    /// The directory must already exist.
    pub fn open(path: &Path) -> Result<Self, LmdbError> {
        let env = unsafe {
            EnvOpenOptions::new()
                .max_dbs(MAX_DBS)
                .map_size(DEFAULT_MAP_SIZE)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let projections_db = env.create_database(&mut wtxn, Some("projections"))?;
        let allowlist_log_db = env.create_database(&mut wtxn, Some("allowlist_log"))?;
        let allowlist_members_db = env.create_database(&mut wtxn, Some("allowlist_members"))?;
        wtxn.commit()?;

        Ok(Self {
            env: Arc::new(env),
            projections_db,
            allowlist_log_db,
            allowlist_members_db,
        })
    }

    /// A projection store backed by this environment.
    pub fn projection_store(&self) -> LmdbProjectionStore {
        LmdbProjectionStore {
            env: Arc::clone(&self.env),
            projections_db: self.projections_db,
        }
    }

    /// An allow-list store backed by this environment.
    pub fn allowlist_store(&self) -> LmdbAllowlistStore {
        LmdbAllowlistStore {
            env: Arc::clone(&self.env),
            log_db: self.allowlist_log_db,
            members_db: self.allowlist_members_db,
        }
    }
}
