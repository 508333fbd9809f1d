//! Root synchronization between the allow-list and the ledger.
//!
//! `sync` is safe to call from many concurrent triggers (every proof
//! request opportunistically checks). There is no distributed lock: two
//! concurrent callers can both observe divergence and both submit. The
//! comparison is re-checked rather than assumed, so the duplicate write is
//! wasted work, not corruption. This window is a known, accepted
//! limitation.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};
use veil_types::{RootHash, TxId};

use crate::backend::{BackendError, LedgerBackend};
use crate::config::RetryPolicy;
use crate::eligibility::EligibilityIndex;
use crate::error::AutomationError;

/// Result of a sync check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The published root already matches the allow-list root.
    InSync,
    /// An update was submitted and confirmed.
    Updated {
        #[serde(serialize_with = "serialize_tx")]
        tx: TxId,
    },
}

fn serialize_tx<S: serde::Serializer>(tx: &TxId, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&tx.to_string())
}

/// Hard deadline on the root-update submission.
const SUBMIT_TIMEOUT_SECS: u64 = 30;

pub struct RootSynchronizer {
    backend: LedgerBackend,
    index: Arc<EligibilityIndex>,
    retry: RetryPolicy,
}

impl RootSynchronizer {
    pub fn new(backend: LedgerBackend, index: Arc<EligibilityIndex>, retry: RetryPolicy) -> Self {
        Self {
            backend,
            index,
            retry,
        }
    }

    /// Reconcile the published root with the allow-list root.
    ///
    /// With `only_if_changed`, a matching root is a no-op. Transient
    /// backend faults are retried with capped exponential backoff; any
    /// other failure surfaces immediately. If the roots still diverge
    /// after a confirmed update, the caller gets a definite error rather
    /// than a silent success.
    pub async fn sync(&self, only_if_changed: bool) -> Result<SyncOutcome, AutomationError> {
        let local = self.index.root()?;
        let published = self
            .with_retry("read published root", || self.backend.published_root())
            .await?;

        if only_if_changed && local == published {
            debug!(root = %local, "published root already in sync");
            return Ok(SyncOutcome::InSync);
        }

        let tx = self
            .with_retry("publish root", || async {
                match tokio::time::timeout(
                    Duration::from_secs(SUBMIT_TIMEOUT_SECS),
                    self.backend.set_eligibility_root(local),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(BackendError::Timeout),
                }
            })
            .await?;

        // Confirm: re-read and require convergence. The allow-list may have
        // grown while the update was in flight; that divergence belongs to
        // the next sync, so compare against the root we submitted.
        let confirmed = self
            .with_retry("confirm published root", || self.backend.published_root())
            .await?;
        if confirmed != local {
            return Err(AutomationError::RootDivergent {
                local,
                published: confirmed,
            });
        }

        info!(root = %local, tx = %tx, "published eligibility root updated");
        Ok(SyncOutcome::Updated { tx })
    }

    /// The allow-list root the ledger should be publishing.
    pub fn local_root(&self) -> Result<RootHash, AutomationError> {
        self.index.root()
    }

    /// Retry `call` on the transient fault class only, with capped
    /// exponential backoff (delay × multiplier per attempt).
    async fn with_retry<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, BackendError>>,
    {
        let mut delay_ms = self.retry.initial_delay_ms;
        let mut attempt = 1u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    warn!(
                        what,
                        attempt,
                        delay_ms,
                        error = %e,
                        "transient backend fault, backing off"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    delay_ms = delay_ms.saturating_mul(self.retry.multiplier);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FaultPoint, InjectedFault};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use veil_ledger::ElectionLedger;
    use veil_store::{AllowlistStore, MemoryAllowlistStore};
    use veil_types::VoterId;

    fn voter(name: &str) -> VoterId {
        VoterId::parse(name).unwrap()
    }

    fn fixture() -> (RootSynchronizer, LedgerBackend, Arc<MemoryAllowlistStore>) {
        let ledger = Arc::new(Mutex::new(ElectionLedger::new(voter("admin"))));
        let backend = LedgerBackend::new(ledger, voter("admin"));
        let allowlist = Arc::new(MemoryAllowlistStore::new());
        let index = Arc::new(EligibilityIndex::new(allowlist.clone()));
        let retry = RetryPolicy {
            max_attempts: 4,
            initial_delay_ms: 10,
            multiplier: 2,
        };
        let synchronizer = RootSynchronizer::new(backend.clone(), index, retry);
        (synchronizer, backend, allowlist)
    }

    #[tokio::test]
    async fn divergent_root_is_published_and_confirmed() {
        let (sync, backend, allowlist) = fixture();
        allowlist.admit(&voter("alice")).unwrap();

        let outcome = sync.sync(true).await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Updated { .. }));
        assert_eq!(
            backend.published_root().await.unwrap(),
            sync.local_root().unwrap()
        );
    }

    #[tokio::test]
    async fn unchanged_root_is_a_no_op() {
        let (sync, backend, allowlist) = fixture();
        allowlist.admit(&voter("alice")).unwrap();
        sync.sync(true).await.unwrap();

        // No allow-list change: at most zero further writes.
        let before = backend.published_root().await.unwrap();
        assert_eq!(sync.sync(true).await.unwrap(), SyncOutcome::InSync);
        assert_eq!(backend.published_root().await.unwrap(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_faults_retry_with_backoff_then_succeed() {
        let (sync, backend, allowlist) = fixture();
        allowlist.admit(&voter("alice")).unwrap();

        for _ in 0..3 {
            backend.inject_fault(
                FaultPoint::Read,
                InjectedFault::Transient("rate limited".into()),
            );
        }
        // Attempts 1-3 fail, attempt 4 succeeds.
        let outcome = sync.sync(true).await.unwrap();
        assert!(matches!(outcome, SyncOutcome::Updated { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_capped() {
        let (sync, backend, allowlist) = fixture();
        allowlist.admit(&voter("alice")).unwrap();

        for _ in 0..4 {
            backend.inject_fault(
                FaultPoint::Read,
                InjectedFault::Transient("rate limited".into()),
            );
        }
        let err = sync.sync(true).await.unwrap_err();
        assert!(matches!(
            err,
            AutomationError::Backend(BackendError::Transient(_))
        ));
    }

    #[tokio::test]
    async fn guard_violations_are_not_retried() {
        let ledger = Arc::new(Mutex::new(ElectionLedger::new(voter("admin"))));
        // Operator is not the admin: set_eligibility_root is rejected
        // deterministically.
        let backend = LedgerBackend::new(ledger, voter("intruder"));
        let allowlist = Arc::new(MemoryAllowlistStore::new());
        allowlist.admit(&voter("alice")).unwrap();
        let index = Arc::new(EligibilityIndex::new(allowlist));
        let sync = RootSynchronizer::new(backend, index, RetryPolicy::default());

        let err = sync.sync(true).await.unwrap_err();
        assert!(matches!(
            err,
            AutomationError::Backend(BackendError::Rejected(_))
        ));
    }
}
