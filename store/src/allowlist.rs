//! The authoritative allow-list capability.
//!
//! An append-only log of admitted identifiers. Identifiers are never
//! removed through this interface; eligibility revocation is expressed by
//! publishing a root built from a different snapshot.

use veil_types::VoterId;

use crate::StoreError;

pub trait AllowlistStore: Send + Sync {
    /// Append an identifier if absent. Returns `true` if it was added,
    /// `false` if it was already present (idempotent).
    fn admit(&self, voter: &VoterId) -> Result<bool, StoreError>;

    /// Whether an identifier has been admitted.
    fn contains(&self, voter: &VoterId) -> Result<bool, StoreError>;

    /// A point-in-time copy of all admitted identifiers, in admission order.
    fn snapshot(&self) -> Result<Vec<VoterId>, StoreError>;

    /// Number of admitted identifiers.
    fn len(&self) -> Result<u64, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}
