//! Timestamp type used throughout the engine.
//!
//! Timestamps are Unix epoch seconds (UTC). Schedule arithmetic is always
//! performed against an injected `now` so the automation logic stays
//! deterministic under test.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A Unix timestamp in seconds since epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Get the current system time as a `Timestamp`.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_secs();
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// This timestamp shifted forward by `secs`.
    pub fn add_secs(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Seconds from `now` until this timestamp (zero if already passed).
    pub fn remaining_from(&self, now: Timestamp) -> u64 {
        self.0.saturating_sub(now.0)
    }

    /// Whether this deadline has passed relative to `now`.
    pub fn has_passed(&self, now: Timestamp) -> bool {
        now.0 >= self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadline_arithmetic() {
        let start = Timestamp::new(1_000);
        let deadline = start.add_secs(120);
        assert_eq!(deadline, Timestamp::new(1_120));
        assert!(!deadline.has_passed(Timestamp::new(1_119)));
        assert!(deadline.has_passed(Timestamp::new(1_120)));
        assert_eq!(deadline.remaining_from(Timestamp::new(1_100)), 20);
        assert_eq!(deadline.remaining_from(Timestamp::new(2_000)), 0);
    }

    #[test]
    fn add_saturates() {
        assert_eq!(
            Timestamp::new(u64::MAX).add_secs(5),
            Timestamp::new(u64::MAX)
        );
    }
}
