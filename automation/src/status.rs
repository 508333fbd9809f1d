//! Read-side view of the automation state.

use serde::Serialize;
use veil_types::{Phase, Timestamp};

use crate::config::AutomationConfig;
use crate::schedule::ScheduleState;

/// Snapshot returned by the automation-status surface.
#[derive(Clone, Debug, Serialize)]
pub struct AutomationStatus {
    /// False once the scheduler has permanently disabled itself.
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_disabled: Option<String>,
    pub round: u64,
    pub phase: String,
    pub now_secs: u64,
    /// Deadline of the observed phase's forward transition, if scheduled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_phase_at_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining_secs: Option<u64>,
    /// mm:ss rendering of the remaining time, for banner displays.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining_display: Option<String>,
    /// A transition submission is in flight right now.
    pub transitioning: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_tx: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_at_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_at_secs: Option<u64>,
}

impl AutomationStatus {
    pub fn from_state(
        state: &ScheduleState,
        phase: Phase,
        now: Timestamp,
        config: &AutomationConfig,
    ) -> Self {
        let next_phase_at = state.next_deadline(phase, config);
        let remaining = next_phase_at.map(|t| t.remaining_from(now));
        Self {
            enabled: !state.is_disabled(),
            reason_disabled: state.disabled_reason.clone(),
            round: state.round.as_u64(),
            phase: phase.as_str().to_string(),
            now_secs: now.as_secs(),
            next_phase_at_secs: next_phase_at.map(|t| t.as_secs()),
            time_remaining_secs: remaining,
            time_remaining_display: remaining.map(veil_utils::format_countdown),
            transitioning: state.in_flight,
            last_transition_tx: state.last_transition_tx.map(|tx| tx.to_string()),
            last_transition_at_secs: state.last_transition_at.map(|t| t.as_secs()),
            last_error: state.last_error.clone(),
            last_error_at_secs: state.last_error_at.map(|t| t.as_secs()),
        }
    }
}
