//! Automation configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::AutomationError;

/// When the commit-phase clock starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartMode {
    /// Start the clock on the first observation of the Commit phase.
    Immediate,
    /// Hold the clock until the first admission event arrives.
    OnFirstJoin,
}

/// Retry policy for the transient backend-fault class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first (so 4 = 1 call + 3 retries).
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(default = "default_retry_delay_ms")]
    pub initial_delay_ms: u64,
    /// Delay multiplier applied after each failed attempt.
    #[serde(default = "default_retry_multiplier")]
    pub multiplier: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            initial_delay_ms: default_retry_delay_ms(),
            multiplier: default_retry_multiplier(),
        }
    }
}

/// Configuration for the automation service.
///
/// Can be loaded from a TOML file via [`AutomationConfig::from_toml_file`]
/// or built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AutomationConfig {
    /// Key under which the tally projection is persisted.
    #[serde(default = "default_election_id")]
    pub election_id: String,

    /// Length of the Commit phase.
    #[serde(default = "default_commit_duration")]
    pub commit_duration_secs: u64,

    /// Length of the Reveal phase.
    #[serde(default = "default_reveal_duration")]
    pub reveal_duration_secs: u64,

    /// Pause in Finished before an automatic reset.
    #[serde(default = "default_reset_grace")]
    pub reset_grace_secs: u64,

    /// Scheduler polling interval.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// When the commit clock starts.
    #[serde(default = "default_start_mode")]
    pub start_mode: StartMode,

    /// Whether Finished rounds reset automatically after the grace period.
    #[serde(default = "default_true")]
    pub auto_reset: bool,

    /// Hard deadline on a single transition submission.
    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_secs: u64,

    /// Events fetched per projector request.
    #[serde(default = "default_batch_size")]
    pub projection_batch_size: usize,

    /// Maximum projector requests per scan call.
    #[serde(default = "default_max_batches")]
    pub projection_max_batches: usize,

    /// Retry policy for transient backend faults.
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty config populates all defaults")
    }
}

impl AutomationConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, AutomationError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AutomationError::Config(format!("read {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| AutomationError::Config(format!("parse {}: {e}", path.display())))
    }
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_election_id() -> String {
    "veil-election".to_string()
}

fn default_commit_duration() -> u64 {
    120
}

fn default_reveal_duration() -> u64 {
    120
}

fn default_reset_grace() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    5
}

fn default_start_mode() -> StartMode {
    StartMode::OnFirstJoin
}

fn default_true() -> bool {
    true
}

fn default_submit_timeout() -> u64 {
    30
}

fn default_batch_size() -> usize {
    100
}

fn default_max_batches() -> usize {
    10
}

fn default_retry_attempts() -> u32 {
    4
}

fn default_retry_delay_ms() -> u64 {
    250
}

fn default_retry_multiplier() -> u64 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config = AutomationConfig::default();
        assert_eq!(config.commit_duration_secs, 120);
        assert_eq!(config.reveal_duration_secs, 120);
        assert_eq!(config.start_mode, StartMode::OnFirstJoin);
        assert!(config.auto_reset);
        assert_eq!(config.retry.max_attempts, 4);
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config: AutomationConfig = toml::from_str(
            r#"
            commit_duration_secs = 30
            start_mode = "immediate"

            [retry]
            max_attempts = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.commit_duration_secs, 30);
        assert_eq!(config.reveal_duration_secs, 120);
        assert_eq!(config.start_mode, StartMode::Immediate);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.initial_delay_ms, 250);
    }
}
