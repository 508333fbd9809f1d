//! LMDB storage backend for the VEIL election engine.
//!
//! Implements the storage traits from `veil-store` using the `heed` LMDB
//! bindings. All databases live in a single environment; each save commits
//! in one write transaction so snapshots are atomic on disk.

pub mod allowlist;
pub mod environment;
pub mod error;
pub mod projection;

pub use allowlist::LmdbAllowlistStore;
pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use projection::LmdbProjectionStore;
