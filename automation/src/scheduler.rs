//! The unattended phase scheduler.
//!
//! A single periodic task. Each tick: read the ledger phase, lazily compute
//! deadlines, and if a forward transition is due, dry-run it first, then
//! submit under a hard timeout. Authorization loss is terminal (the
//! scheduler disables itself instead of retrying forever); every other
//! failure is recorded and retried on the next tick.

use std::sync::Mutex;
use std::time::Duration;

use tracing::{error, info, warn};
use veil_types::{Phase, RoundId, Timestamp};

use crate::backend::{BackendError, LedgerBackend, Transition};
use crate::config::AutomationConfig;
use crate::error::AutomationError;
use crate::schedule::ScheduleState;
use crate::status::AutomationStatus;

pub struct PhaseScheduler {
    backend: LedgerBackend,
    config: AutomationConfig,
    state: Mutex<ScheduleState>,
}

impl PhaseScheduler {
    pub fn new(backend: LedgerBackend, config: AutomationConfig, round: RoundId) -> Self {
        Self {
            backend,
            config,
            state: Mutex::new(ScheduleState::new(round)),
        }
    }

    /// An admission event arrived; starts the commit clock in
    /// `OnFirstJoin` mode.
    pub fn notify_joined(&self) {
        self.state.lock().expect("schedule lock poisoned").mark_joined();
    }

    pub fn is_disabled(&self) -> bool {
        self.state.lock().expect("schedule lock poisoned").is_disabled()
    }

    /// Status snapshot for the observed phase.
    pub fn status(&self, phase: Phase, now: Timestamp) -> AutomationStatus {
        let state = self.state.lock().expect("schedule lock poisoned");
        AutomationStatus::from_state(&state, phase, now, &self.config)
    }

    /// One scheduler evaluation. Also invoked by the manual wake endpoint.
    pub async fn tick(&self) -> Result<(), AutomationError> {
        self.tick_at(Timestamp::now()).await
    }

    /// Tick with an injected clock (all scheduling decisions use `now`; the
    /// submission timeout still runs on the tokio clock).
    pub async fn tick_at(&self, now: Timestamp) -> Result<(), AutomationError> {
        if self.is_disabled() {
            return Ok(());
        }

        // Read ledger state without holding the schedule lock.
        let phase = match self.backend.phase().await {
            Ok(phase) => phase,
            Err(e) => {
                self.record_error(format!("phase read failed: {e}"), now);
                return Ok(());
            }
        };
        let round = match self.backend.round().await {
            Ok(round) => round,
            Err(e) => {
                self.record_error(format!("round read failed: {e}"), now);
                return Ok(());
            }
        };

        let due = {
            let mut state = self.state.lock().expect("schedule lock poisoned");
            state.observe_round(round);
            state.ensure_schedule(phase, now, &self.config);
            let due = state.due_transition(phase, now, &self.config);
            match due {
                Some(transition) if !state.in_flight => {
                    state.in_flight = true;
                    Some(transition)
                }
                _ => None,
            }
        };
        let Some(transition) = due else {
            return Ok(());
        };

        let result = self.drive_transition(transition, now).await;
        self.state.lock().expect("schedule lock poisoned").in_flight = false;
        result
    }

    /// Simulate, then submit under the configured timeout.
    async fn drive_transition(
        &self,
        transition: Transition,
        now: Timestamp,
    ) -> Result<(), AutomationError> {
        if let Err(e) = self.backend.simulate_transition(transition).await {
            if e.is_authorization() {
                self.disable(transition, &e);
                return Ok(());
            }
            warn!(
                transition = transition.as_str(),
                error = %e,
                "transition simulation failed, will retry next tick"
            );
            self.record_error(format!("simulate {}: {e}", transition.as_str()), now);
            return Ok(());
        }

        let timeout = Duration::from_secs(self.config.submit_timeout_secs);
        let submitted = tokio::time::timeout(timeout, self.backend.submit_transition(transition));
        match submitted.await {
            Ok(Ok(tx)) => {
                info!(
                    transition = transition.as_str(),
                    tx = %tx,
                    "phase transition confirmed"
                );
                let mut state = self.state.lock().expect("schedule lock poisoned");
                state.apply_transition(transition, tx, now, &self.config);
            }
            Ok(Err(e)) if e.is_authorization() => {
                self.disable(transition, &e);
            }
            Ok(Err(BackendError::Timeout)) | Err(_) => {
                // Unknown outcome: the submission may still land. Leave the
                // schedule untouched; the next tick re-reads the phase.
                warn!(
                    transition = transition.as_str(),
                    "transition submission timed out, outcome unknown"
                );
                self.record_error(
                    format!("submit {}: timed out, outcome unknown", transition.as_str()),
                    now,
                );
            }
            Ok(Err(e)) => {
                warn!(
                    transition = transition.as_str(),
                    error = %e,
                    "transition submission failed, will retry next tick"
                );
                self.record_error(format!("submit {}: {e}", transition.as_str()), now);
            }
        }
        Ok(())
    }

    fn disable(&self, transition: Transition, cause: &BackendError) {
        error!(
            transition = transition.as_str(),
            error = %cause,
            "operator lost ledger authorization, disabling scheduler"
        );
        let mut state = self.state.lock().expect("schedule lock poisoned");
        state.disable(format!(
            "operator is no longer authorized ({} failed: {cause})",
            transition.as_str()
        ));
    }

    fn record_error(&self, message: String, now: Timestamp) {
        self.state
            .lock()
            .expect("schedule lock poisoned")
            .record_error(message, now);
    }

    /// The polling loop. Exits on shutdown or when the scheduler disables
    /// itself (authorization loss stops the polling entirely).
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("scheduler shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if self.is_disabled() {
                        warn!("scheduler disabled, stopping polling loop");
                        break;
                    }
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "scheduler tick failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FaultPoint, InjectedFault};
    use crate::config::StartMode;
    use std::sync::Arc;
    use tokio::sync::Mutex as AsyncMutex;
    use veil_ledger::ElectionLedger;
    use veil_types::VoterId;

    fn voter(name: &str) -> VoterId {
        VoterId::parse(name).unwrap()
    }

    fn config() -> AutomationConfig {
        AutomationConfig {
            commit_duration_secs: 120,
            reveal_duration_secs: 120,
            reset_grace_secs: 60,
            start_mode: StartMode::Immediate,
            submit_timeout_secs: 5,
            ..AutomationConfig::default()
        }
    }

    fn scheduler_with(config: AutomationConfig) -> (PhaseScheduler, LedgerBackend) {
        let ledger = Arc::new(AsyncMutex::new(ElectionLedger::new(voter("admin"))));
        let backend = LedgerBackend::new(ledger, voter("admin"));
        let scheduler = PhaseScheduler::new(backend.clone(), config, RoundId::FIRST);
        (scheduler, backend)
    }

    #[tokio::test]
    async fn full_round_advances_on_schedule() {
        let (scheduler, backend) = scheduler_with(config());

        // t=0: clock starts, nothing due.
        scheduler.tick_at(Timestamp::new(0)).await.unwrap();
        assert_eq!(backend.phase().await.unwrap(), Phase::Commit);

        // t=121: commit deadline passed.
        scheduler.tick_at(Timestamp::new(121)).await.unwrap();
        assert_eq!(backend.phase().await.unwrap(), Phase::Reveal);

        // t=242: reveal deadline (120 + 120) passed.
        scheduler.tick_at(Timestamp::new(242)).await.unwrap();
        assert_eq!(backend.phase().await.unwrap(), Phase::Finished);

        // t=302: reset grace passed; auto-reset starts round 1.
        scheduler.tick_at(Timestamp::new(302)).await.unwrap();
        assert_eq!(backend.phase().await.unwrap(), Phase::Commit);
        assert_eq!(backend.round().await.unwrap(), RoundId::new(1));
        let status = scheduler.status(Phase::Commit, Timestamp::new(302));
        assert_eq!(status.round, 1);
    }

    #[tokio::test]
    async fn early_ticks_do_nothing() {
        let (scheduler, backend) = scheduler_with(config());
        scheduler.tick_at(Timestamp::new(0)).await.unwrap();
        scheduler.tick_at(Timestamp::new(60)).await.unwrap();
        scheduler.tick_at(Timestamp::new(119)).await.unwrap();
        assert_eq!(backend.phase().await.unwrap(), Phase::Commit);
    }

    #[tokio::test]
    async fn on_first_join_waits_for_admission() {
        let cfg = AutomationConfig {
            start_mode: StartMode::OnFirstJoin,
            ..config()
        };
        let (scheduler, backend) = scheduler_with(cfg);

        scheduler.tick_at(Timestamp::new(0)).await.unwrap();
        scheduler.tick_at(Timestamp::new(10_000)).await.unwrap();
        assert_eq!(backend.phase().await.unwrap(), Phase::Commit);

        scheduler.notify_joined();
        scheduler.tick_at(Timestamp::new(10_000)).await.unwrap();
        scheduler.tick_at(Timestamp::new(10_121)).await.unwrap();
        assert_eq!(backend.phase().await.unwrap(), Phase::Reveal);
    }

    #[tokio::test]
    async fn authorization_loss_disables_permanently() {
        let (scheduler, backend) = scheduler_with(config());
        scheduler.tick_at(Timestamp::new(0)).await.unwrap();

        backend.inject_fault(FaultPoint::Simulate, InjectedFault::Unauthorized);
        scheduler.tick_at(Timestamp::new(121)).await.unwrap();
        assert!(scheduler.is_disabled());
        assert_eq!(backend.phase().await.unwrap(), Phase::Commit);

        // Sticky: later due ticks perform no backend calls. A scripted
        // transient read fault stays queued because the tick never reads.
        backend.inject_fault(FaultPoint::Read, InjectedFault::Transient("unseen".into()));
        scheduler.tick_at(Timestamp::new(500)).await.unwrap();
        assert!(backend.phase().await.unwrap_err().is_transient());
    }

    #[tokio::test]
    async fn transient_simulation_failure_retries_next_tick() {
        let (scheduler, backend) = scheduler_with(config());
        scheduler.tick_at(Timestamp::new(0)).await.unwrap();

        backend.inject_fault(
            FaultPoint::Simulate,
            InjectedFault::Transient("rate limited".into()),
        );
        scheduler.tick_at(Timestamp::new(121)).await.unwrap();
        assert_eq!(backend.phase().await.unwrap(), Phase::Commit);
        assert!(!scheduler.is_disabled());
        let status = scheduler.status(Phase::Commit, Timestamp::new(121));
        assert!(status.last_error.as_deref().unwrap().contains("rate limited"));

        // Next tick succeeds.
        scheduler.tick_at(Timestamp::new(126)).await.unwrap();
        assert_eq!(backend.phase().await.unwrap(), Phase::Reveal);
    }

    #[tokio::test]
    async fn timeout_leaves_outcome_to_next_tick() {
        let (scheduler, backend) = scheduler_with(config());
        scheduler.tick_at(Timestamp::new(0)).await.unwrap();

        // The submission lands on the ledger but reports a timeout.
        backend.inject_fault(FaultPoint::Submit, InjectedFault::Timeout { lands: true });
        scheduler.tick_at(Timestamp::new(121)).await.unwrap();

        let status = scheduler.status(Phase::Reveal, Timestamp::new(121));
        assert!(!status.transitioning, "in-flight flag must clear");
        assert!(status.last_error.as_deref().unwrap().contains("outcome unknown"));

        // The ledger did advance; the next tick observes Reveal and
        // schedules the reveal deadline instead of resubmitting.
        assert_eq!(backend.phase().await.unwrap(), Phase::Reveal);
        scheduler.tick_at(Timestamp::new(126)).await.unwrap();
        assert_eq!(backend.phase().await.unwrap(), Phase::Reveal);
    }

    #[tokio::test]
    async fn manual_round_change_is_adopted() {
        let (scheduler, backend) = scheduler_with(config());
        scheduler.tick_at(Timestamp::new(0)).await.unwrap();

        // Admin drives the round to Finished and resets out-of-band.
        {
            let ledger = backend.ledger();
            let mut ledger = ledger.lock().await;
            let admin = voter("admin");
            ledger.start_reveal(&admin).unwrap();
            ledger.finish_election(&admin).unwrap();
            ledger.reset_election(&admin).unwrap();
        }

        scheduler.tick_at(Timestamp::new(10)).await.unwrap();
        let status = scheduler.status(Phase::Commit, Timestamp::new(10));
        assert_eq!(status.round, 1);
    }
}
