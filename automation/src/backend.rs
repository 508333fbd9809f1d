//! The ledger backend seam.
//!
//! The automation engines never touch `ElectionLedger` directly; they go
//! through [`LedgerBackend`], which serializes access, classifies failures
//! into the retryable/terminal taxonomy, and (for deterministic tests)
//! carries a scripted fault queue that can stand in for rate limiting,
//! submission timeouts, and authorization loss.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};

use thiserror::Error;
use tokio::sync::Mutex;

use veil_crypto::blake2b_256_multi;
use veil_ledger::{ElectionLedger, EventRecord, LedgerError};
use veil_types::{Phase, RootHash, RoundId, TxId, VoterId};

/// A phase transition the automation can drive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    StartReveal,
    Finish,
    Reset,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::StartReveal => "start_reveal",
            Transition::Finish => "finish_election",
            Transition::Reset => "reset_election",
        }
    }
}

/// Failure classes surfaced by the backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// A deterministic guard violation. Never retried.
    #[error("rejected by ledger: {0}")]
    Rejected(#[from] LedgerError),

    /// Backend overload / rate limiting. Expected to succeed on retry
    /// after a delay.
    #[error("transient backend fault: {0}")]
    Transient(String),

    /// The submission deadline elapsed with the outcome unknown. The call
    /// may still land; callers must re-read ledger state instead of
    /// blindly resubmitting.
    #[error("submission timed out; outcome unknown")]
    Timeout,
}

impl BackendError {
    /// The only class worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }

    /// Whether the automation's caller has lost authorization. Terminal
    /// for the scheduler.
    pub fn is_authorization(&self) -> bool {
        matches!(self, BackendError::Rejected(e) if e.is_authorization())
    }
}

/// Where a scripted fault fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Read,
    Simulate,
    Submit,
    SetRoot,
}

/// A scripted fault, consumed once per matching call.
#[derive(Clone, Debug)]
pub enum InjectedFault {
    Transient(String),
    /// Time out the call. When `lands` is true the mutation is applied
    /// anyway, modeling a submission that completed after the deadline.
    Timeout { lands: bool },
    /// Fail as if the operator were not the admin.
    Unauthorized,
}

#[derive(Default)]
struct FaultScript {
    queues: StdMutex<std::collections::HashMap<FaultPoint, VecDeque<InjectedFault>>>,
}

impl FaultScript {
    fn push(&self, point: FaultPoint, fault: InjectedFault) {
        let mut queues = self.queues.lock().expect("fault script lock poisoned");
        queues.entry(point).or_default().push_back(fault);
    }

    fn pop(&self, point: FaultPoint) -> Option<InjectedFault> {
        let mut queues = self.queues.lock().expect("fault script lock poisoned");
        queues.get_mut(&point).and_then(VecDeque::pop_front)
    }
}

/// Serialized access to the election ledger for the automation engines.
///
/// Cloning is cheap; clones share the same underlying ledger and fault
/// script.
#[derive(Clone)]
pub struct LedgerBackend {
    ledger: Arc<Mutex<ElectionLedger>>,
    operator: VoterId,
    faults: Arc<FaultScript>,
}

impl LedgerBackend {
    pub fn new(ledger: Arc<Mutex<ElectionLedger>>, operator: VoterId) -> Self {
        Self {
            ledger,
            operator,
            faults: Arc::new(FaultScript::default()),
        }
    }

    /// The shared ledger handle (used by the RPC passthrough surface).
    pub fn ledger(&self) -> Arc<Mutex<ElectionLedger>> {
        Arc::clone(&self.ledger)
    }

    pub fn operator(&self) -> &VoterId {
        &self.operator
    }

    /// Queue a fault to fire on the next call at `point`. Test support,
    /// following the nullable-infrastructure pattern: production code never
    /// pushes faults, and an empty script is free.
    pub fn inject_fault(&self, point: FaultPoint, fault: InjectedFault) {
        self.faults.push(point, fault);
    }

    fn unauthorized_error(&self) -> BackendError {
        BackendError::Rejected(LedgerError::NotAdmin {
            caller: self.operator.clone(),
        })
    }

    /// Apply a scripted fault, if any. Returns `Ok(lands)` where `lands`
    /// means "proceed with the mutation, then report the fault".
    fn take_fault(&self, point: FaultPoint) -> Result<bool, BackendError> {
        match self.faults.pop(point) {
            None => Ok(false),
            Some(InjectedFault::Transient(msg)) => Err(BackendError::Transient(msg)),
            Some(InjectedFault::Unauthorized) => Err(self.unauthorized_error()),
            Some(InjectedFault::Timeout { lands: false }) => Err(BackendError::Timeout),
            Some(InjectedFault::Timeout { lands: true }) => Ok(true),
        }
    }

    // ── Reads ────────────────────────────────────────────────────────────

    pub async fn phase(&self) -> Result<Phase, BackendError> {
        self.take_fault(FaultPoint::Read)?;
        Ok(self.ledger.lock().await.phase())
    }

    pub async fn round(&self) -> Result<RoundId, BackendError> {
        self.take_fault(FaultPoint::Read)?;
        Ok(self.ledger.lock().await.round())
    }

    pub async fn published_root(&self) -> Result<RootHash, BackendError> {
        self.take_fault(FaultPoint::Read)?;
        Ok(self.ledger.lock().await.eligibility_root())
    }

    pub async fn events(&self, from: u64, limit: usize) -> Result<Vec<EventRecord>, BackendError> {
        self.take_fault(FaultPoint::Read)?;
        Ok(self.ledger.lock().await.events(from, limit))
    }

    // ── Transitions ──────────────────────────────────────────────────────

    fn apply_transition(
        ledger: &mut ElectionLedger,
        transition: Transition,
        caller: &VoterId,
    ) -> Result<(), LedgerError> {
        match transition {
            Transition::StartReveal => ledger.start_reveal(caller),
            Transition::Finish => ledger.finish_election(caller),
            Transition::Reset => ledger.reset_election(caller).map(|_| ()),
        }
    }

    /// Dry-run a transition against a copy of the ledger. No state is
    /// mutated regardless of outcome.
    pub async fn simulate_transition(&self, transition: Transition) -> Result<(), BackendError> {
        self.take_fault(FaultPoint::Simulate)?;
        let mut copy = self.ledger.lock().await.clone();
        Self::apply_transition(&mut copy, transition, &self.operator)?;
        Ok(())
    }

    /// Submit a transition for real.
    pub async fn submit_transition(&self, transition: Transition) -> Result<TxId, BackendError> {
        let lands_despite_timeout = self.take_fault(FaultPoint::Submit)?;
        let mut ledger = self.ledger.lock().await;
        Self::apply_transition(&mut ledger, transition, &self.operator)?;
        let tx = Self::tx_id(transition.as_str(), ledger.event_count());
        if lands_despite_timeout {
            return Err(BackendError::Timeout);
        }
        Ok(tx)
    }

    /// Publish a new eligibility root.
    pub async fn set_eligibility_root(&self, root: RootHash) -> Result<TxId, BackendError> {
        let lands_despite_timeout = self.take_fault(FaultPoint::SetRoot)?;
        let mut ledger = self.ledger.lock().await;
        ledger.set_eligibility_root(&self.operator, root)?;
        let tx = Self::tx_id("set_eligibility_root", ledger.event_count());
        if lands_despite_timeout {
            return Err(BackendError::Timeout);
        }
        Ok(tx)
    }

    fn tx_id(op: &str, sequence: u64) -> TxId {
        TxId::new(blake2b_256_multi(&[op.as_bytes(), &sequence.to_be_bytes()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voter(name: &str) -> VoterId {
        VoterId::parse(name).unwrap()
    }

    fn backend_with_admin(operator: &str, admin: &str) -> LedgerBackend {
        let ledger = Arc::new(Mutex::new(ElectionLedger::new(voter(admin))));
        LedgerBackend::new(ledger, voter(operator))
    }

    #[tokio::test]
    async fn simulation_has_no_side_effects() {
        let backend = backend_with_admin("admin", "admin");
        backend.simulate_transition(Transition::StartReveal).await.unwrap();
        assert_eq!(backend.phase().await.unwrap(), Phase::Commit);
    }

    #[tokio::test]
    async fn simulation_reports_guard_violations() {
        let backend = backend_with_admin("admin", "admin");
        let err = backend.simulate_transition(Transition::Finish).await.unwrap_err();
        assert!(matches!(
            err,
            BackendError::Rejected(LedgerError::WrongPhase { .. })
        ));
        assert!(!err.is_authorization());
    }

    #[tokio::test]
    async fn non_admin_operator_is_an_authorization_failure() {
        let backend = backend_with_admin("intruder", "admin");
        let err = backend.simulate_transition(Transition::StartReveal).await.unwrap_err();
        assert!(err.is_authorization());
    }

    #[tokio::test]
    async fn submit_advances_phase_and_returns_tx() {
        let backend = backend_with_admin("admin", "admin");
        backend.submit_transition(Transition::StartReveal).await.unwrap();
        assert_eq!(backend.phase().await.unwrap(), Phase::Reveal);
    }

    #[tokio::test]
    async fn scripted_timeout_can_land_anyway() {
        let backend = backend_with_admin("admin", "admin");
        backend.inject_fault(FaultPoint::Submit, InjectedFault::Timeout { lands: true });
        let err = backend.submit_transition(Transition::StartReveal).await.unwrap_err();
        assert_eq!(err, BackendError::Timeout);
        // The mutation landed despite the timeout report.
        assert_eq!(backend.phase().await.unwrap(), Phase::Reveal);
    }

    #[tokio::test]
    async fn scripted_faults_fire_once_in_order() {
        let backend = backend_with_admin("admin", "admin");
        backend.inject_fault(FaultPoint::Read, InjectedFault::Transient("rate limited".into()));
        assert!(backend.phase().await.unwrap_err().is_transient());
        assert_eq!(backend.phase().await.unwrap(), Phase::Commit);
    }
}
