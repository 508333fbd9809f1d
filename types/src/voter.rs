//! Voter identifier type.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum accepted identifier length, matching the proof service's input
/// sanitizer.
pub const MAX_VOTER_ID_LEN: usize = 64;

/// A canonicalized voter identifier.
///
/// Identifiers are supplied by the identity-proofing collaborator (opaque
/// ids or wallet addresses). Canonical form is lowercase with surrounding
/// whitespace removed, so that the same identifier always hashes to the
/// same accumulator leaf.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoterId(String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoterIdError {
    #[error("voter identifier is empty")]
    Empty,

    #[error("voter identifier exceeds {MAX_VOTER_ID_LEN} characters")]
    TooLong,

    #[error("voter identifier contains invalid character {0:?}")]
    InvalidCharacter(char),
}

impl VoterId {
    /// Parse and canonicalize an identifier.
    ///
    /// Accepts alphanumerics, `_` and `-`, which covers both opaque voter
    /// ids and 0x-prefixed addresses after lowercasing.
    pub fn parse(raw: &str) -> Result<Self, VoterIdError> {
        let canonical = raw.trim().to_lowercase();
        if canonical.is_empty() {
            return Err(VoterIdError::Empty);
        }
        if canonical.len() > MAX_VOTER_ID_LEN {
            return Err(VoterIdError::TooLong);
        }
        if let Some(bad) = canonical
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '_' && *c != '-')
        {
            return Err(VoterIdError::InvalidCharacter(bad));
        }
        Ok(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical bytes, the input to accumulator leaf hashing.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VoterId({})", self.0)
    }
}

impl fmt::Display for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
