//! Owned scheduling state and its deadline arithmetic.
//!
//! `ScheduleState` is one value threaded explicitly through each tick, not
//! an ambient global. Everything here is pure with respect to time: `now` is
//! always a parameter. Deadlines are computed lazily on the first
//! observation of a phase, so the whole state can be reconstructed from the
//! ledger's current phase after a restart.

use veil_types::{Phase, RoundId, Timestamp, TxId};

use crate::backend::Transition;
use crate::config::{AutomationConfig, StartMode};

#[derive(Clone, Debug)]
pub struct ScheduleState {
    /// Round the schedule is tracking; resynced from the ledger when they
    /// diverge (e.g. after a manual reset).
    pub round: RoundId,
    /// End of the Commit phase, once the clock has started.
    pub commit_end: Option<Timestamp>,
    /// End of the Reveal phase.
    pub reveal_end: Option<Timestamp>,
    /// When a Finished round auto-resets.
    pub reset_at: Option<Timestamp>,
    /// Whether the commit clock has started (always true in Immediate mode).
    pub clock_started: bool,
    /// Re-entrancy guard: a transition is being submitted right now.
    pub in_flight: bool,
    /// Set when the scheduler shut itself down permanently.
    pub disabled_reason: Option<String>,
    pub last_error: Option<String>,
    pub last_error_at: Option<Timestamp>,
    pub last_transition_tx: Option<TxId>,
    pub last_transition_at: Option<Timestamp>,
}

impl ScheduleState {
    pub fn new(round: RoundId) -> Self {
        Self {
            round,
            commit_end: None,
            reveal_end: None,
            reset_at: None,
            clock_started: false,
            in_flight: false,
            disabled_reason: None,
            last_error: None,
            last_error_at: None,
            last_transition_tx: None,
            last_transition_at: None,
        }
    }

    /// An external admission event arrived; in `OnFirstJoin` mode this is
    /// what starts the commit clock.
    pub fn mark_joined(&mut self) {
        self.clock_started = true;
    }

    /// Adopt the ledger's round if it moved under us (manual reset, missed
    /// submission that landed after its timeout). All deadlines are stale
    /// in that case and are recomputed lazily.
    pub fn observe_round(&mut self, round: RoundId) {
        if round != self.round {
            self.round = round;
            self.commit_end = None;
            self.reveal_end = None;
            self.reset_at = None;
            self.clock_started = false;
        }
    }

    /// Lazily compute the deadlines relevant to the observed phase.
    pub fn ensure_schedule(&mut self, phase: Phase, now: Timestamp, config: &AutomationConfig) {
        match phase {
            Phase::Commit => {
                if config.start_mode == StartMode::OnFirstJoin && !self.clock_started {
                    return;
                }
                self.clock_started = true;
                if self.commit_end.is_none() {
                    let commit_end = now.add_secs(config.commit_duration_secs);
                    self.commit_end = Some(commit_end);
                    self.reveal_end = Some(commit_end.add_secs(config.reveal_duration_secs));
                }
                self.reset_at = None;
            }
            Phase::Reveal => {
                if self.reveal_end.is_none() {
                    // Joined mid-round (restart, or the phase advanced by
                    // other means): backfill commit_end and time the reveal
                    // window from now.
                    if self.commit_end.is_none() {
                        self.commit_end = Some(now);
                    }
                    self.reveal_end = Some(now.add_secs(config.reveal_duration_secs));
                }
                self.reset_at = None;
            }
            Phase::Finished => {
                if self.reset_at.is_none() {
                    self.reset_at = Some(now.add_secs(config.reset_grace_secs));
                }
            }
        }
    }

    /// The forward transition whose deadline has passed, if any.
    pub fn due_transition(
        &self,
        phase: Phase,
        now: Timestamp,
        config: &AutomationConfig,
    ) -> Option<Transition> {
        match phase {
            Phase::Commit => {
                let deadline = self.commit_end?;
                deadline.has_passed(now).then_some(Transition::StartReveal)
            }
            Phase::Reveal => {
                let deadline = self.reveal_end?;
                deadline.has_passed(now).then_some(Transition::Finish)
            }
            Phase::Finished => {
                if !config.auto_reset {
                    return None;
                }
                let deadline = self.reset_at?;
                deadline.has_passed(now).then_some(Transition::Reset)
            }
        }
    }

    /// Record a confirmed transition: clear deadlines that no longer apply,
    /// stamp the reset deadline when the round finishes, and advance the
    /// round counter on reset.
    pub fn apply_transition(
        &mut self,
        transition: Transition,
        tx: TxId,
        now: Timestamp,
        config: &AutomationConfig,
    ) {
        match transition {
            Transition::StartReveal => {
                self.commit_end = None;
            }
            Transition::Finish => {
                self.commit_end = None;
                self.reveal_end = None;
                // finished_at is exactly now; ensure_schedule only backfills
                // this on cold starts that first observe Finished.
                self.reset_at = Some(now.add_secs(config.reset_grace_secs));
            }
            Transition::Reset => {
                self.commit_end = None;
                self.reveal_end = None;
                self.reset_at = None;
                self.clock_started = false;
                self.round = self.round.next();
            }
        }
        self.last_transition_tx = Some(tx);
        self.last_transition_at = Some(now);
        self.last_error = None;
        self.last_error_at = None;
    }

    pub fn record_error(&mut self, message: impl Into<String>, now: Timestamp) {
        self.last_error = Some(message.into());
        self.last_error_at = Some(now);
    }

    pub fn disable(&mut self, reason: impl Into<String>) {
        self.disabled_reason = Some(reason.into());
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled_reason.is_some()
    }

    /// The deadline governing the observed phase, for status reporting.
    pub fn next_deadline(&self, phase: Phase, config: &AutomationConfig) -> Option<Timestamp> {
        match phase {
            Phase::Commit => self.commit_end,
            Phase::Reveal => self.reveal_end,
            Phase::Finished => config.auto_reset.then_some(self.reset_at).flatten(),
        }
    }
}
