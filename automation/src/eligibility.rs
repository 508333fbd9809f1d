//! Allow-list-backed eligibility: proof issuance and admission.

use std::sync::{Arc, Mutex};

use tracing::{info, warn};
use veil_crypto::accumulator::MembershipProof;
use veil_crypto::EligibilityAccumulator;
use veil_store::AllowlistStore;
use veil_types::{RootHash, VoterId};

use crate::error::AutomationError;
use crate::synchronizer::{RootSynchronizer, SyncOutcome};

/// Cached accumulator over the allow-list.
///
/// The allow-list is append-only, so its length doubles as a cheap version
/// number: the tree is rebuilt only when the length changes, and proofs are
/// served from the cached tree in O(log n).
pub struct EligibilityIndex {
    allowlist: Arc<dyn AllowlistStore>,
    cached: Mutex<Option<CachedTree>>,
}

struct CachedTree {
    version: u64,
    accumulator: EligibilityAccumulator,
}

impl EligibilityIndex {
    pub fn new(allowlist: Arc<dyn AllowlistStore>) -> Self {
        Self {
            allowlist,
            cached: Mutex::new(None),
        }
    }

    pub fn allowlist(&self) -> &Arc<dyn AllowlistStore> {
        &self.allowlist
    }

    /// Run `f` against the up-to-date accumulator.
    fn with_current<T>(
        &self,
        f: impl FnOnce(&EligibilityAccumulator) -> T,
    ) -> Result<T, AutomationError> {
        let version = self.allowlist.len()?;
        let mut cached = self.cached.lock().expect("eligibility cache lock poisoned");
        let stale = match cached.as_ref() {
            Some(tree) => tree.version != version,
            None => true,
        };
        if stale {
            let snapshot = self.allowlist.snapshot()?;
            *cached = Some(CachedTree {
                version,
                accumulator: EligibilityAccumulator::build(&snapshot),
            });
        }
        Ok(f(&cached.as_ref().expect("cache populated above").accumulator))
    }

    /// The current allow-list root.
    pub fn root(&self) -> Result<RootHash, AutomationError> {
        self.with_current(|acc| acc.root())
    }

    /// Membership proof for an identifier, or `None` if not admitted.
    pub fn prove(&self, voter: &VoterId) -> Result<Option<MembershipProof>, AutomationError> {
        self.with_current(|acc| acc.prove(voter))
    }
}

/// Outcome of an admission request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdmissionOutcome {
    /// False when the identifier was already admitted (no mutation).
    pub added: bool,
    pub sync: SyncOutcome,
}

/// The admission + proof surface offered to the identity-proofing
/// collaborator.
pub struct EligibilityService {
    index: Arc<EligibilityIndex>,
    synchronizer: Arc<RootSynchronizer>,
}

impl EligibilityService {
    pub fn new(index: Arc<EligibilityIndex>, synchronizer: Arc<RootSynchronizer>) -> Self {
        Self {
            index,
            synchronizer,
        }
    }

    pub fn index(&self) -> &Arc<EligibilityIndex> {
        &self.index
    }

    /// Admit an identifier. Idempotent: an already-admitted identifier
    /// performs no mutation. A root sync runs before success is reported;
    /// if the sync cannot be confirmed, the caller gets a definite error:
    /// an admitted-but-unsynced identifier would have its proofs rejected
    /// by the ledger.
    pub async fn admit(&self, voter: &VoterId) -> Result<AdmissionOutcome, AutomationError> {
        let added = self.index.allowlist().admit(voter)?;
        if added {
            info!(voter = %voter, "identifier admitted to allow-list");
        }
        let sync = self.synchronizer.sync(true).await?;
        Ok(AdmissionOutcome { added, sync })
    }

    /// Membership proof for an identifier. Every proof request
    /// opportunistically checks root sync; a failed check is logged but
    /// does not block proof issuance.
    pub async fn proof(&self, voter: &VoterId) -> Result<Option<MembershipProof>, AutomationError> {
        if let Err(e) = self.synchronizer.sync(true).await {
            warn!(error = %e, "opportunistic root sync failed");
        }
        self.index.prove(voter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LedgerBackend;
    use crate::config::RetryPolicy;
    use std::sync::Arc;
    use tokio::sync::Mutex as AsyncMutex;
    use veil_crypto::verify_membership;
    use veil_ledger::ElectionLedger;
    use veil_store::MemoryAllowlistStore;

    fn voter(name: &str) -> VoterId {
        VoterId::parse(name).unwrap()
    }

    fn service() -> (EligibilityService, LedgerBackend) {
        let ledger = Arc::new(AsyncMutex::new(ElectionLedger::new(voter("admin"))));
        let backend = LedgerBackend::new(ledger, voter("admin"));
        let allowlist = Arc::new(MemoryAllowlistStore::new());
        let index = Arc::new(EligibilityIndex::new(allowlist));
        let synchronizer = Arc::new(RootSynchronizer::new(
            backend.clone(),
            index.clone(),
            RetryPolicy::default(),
        ));
        (EligibilityService::new(index, synchronizer), backend)
    }

    #[tokio::test]
    async fn admission_syncs_root_before_reporting_success() {
        let (service, backend) = service();
        let outcome = service.admit(&voter("alice")).await.unwrap();
        assert!(outcome.added);
        assert!(matches!(outcome.sync, SyncOutcome::Updated { .. }));

        // The proof issued afterwards verifies against the published root.
        let proof = service.proof(&voter("alice")).await.unwrap().unwrap();
        let published = backend.published_root().await.unwrap();
        assert!(verify_membership(&voter("alice"), &proof, &published));
    }

    #[tokio::test]
    async fn re_admission_is_idempotent() {
        let (service, _backend) = service();
        service.admit(&voter("alice")).await.unwrap();
        let outcome = service.admit(&voter("alice")).await.unwrap();
        assert!(!outcome.added);
        assert_eq!(outcome.sync, SyncOutcome::InSync);
    }

    #[tokio::test]
    async fn unknown_identifier_gets_no_proof() {
        let (service, _backend) = service();
        service.admit(&voter("alice")).await.unwrap();
        assert!(service.proof(&voter("bob")).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn admission_with_unconfirmable_sync_reports_failure() {
        let (service, backend) = service();
        // Exhaust the retry budget on the published-root read: the sync
        // cannot be confirmed, so the admission must not claim success.
        for _ in 0..RetryPolicy::default().max_attempts {
            backend.inject_fault(
                crate::backend::FaultPoint::Read,
                crate::backend::InjectedFault::Transient("backend overloaded".into()),
            );
        }
        assert!(service.admit(&voter("alice")).await.is_err());
    }
}
