use thiserror::Error;
use veil_types::{CandidateId, Phase, VoterId};

/// Guard violations raised by ledger operations.
///
/// All of these are deterministic and non-retryable: the call failed before
/// any state was written, and resubmitting the same call yields the same
/// error until the ledger's state changes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("caller {caller} is not the election admin")]
    NotAdmin { caller: VoterId },

    #[error("operation requires {expected} phase, ledger is in {actual}")]
    WrongPhase { expected: Phase, actual: Phase },

    #[error("candidate name must be 1..={max} bytes, got {len}")]
    InvalidNameLength { len: usize, max: usize },

    #[error("unknown candidate id {0}")]
    UnknownCandidate(CandidateId),

    #[error("candidate {0} has been removed from the ballot")]
    InactiveCandidate(CandidateId),

    #[error("commitment digest is empty")]
    EmptyCommitment,

    #[error("voter {voter} is not eligible under the published root")]
    NotEligible { voter: VoterId },

    #[error("voter {voter} has already committed this round")]
    AlreadyCommitted { voter: VoterId },

    #[error("voter {voter} has no commitment to reveal")]
    NoCommitment { voter: VoterId },

    #[error("voter {voter} has already revealed")]
    AlreadyRevealed { voter: VoterId },

    #[error("revealed choice and salt do not match the stored commitment")]
    CommitmentMismatch,

    #[error("election can only be reset after it has finished")]
    ResetBeforeFinish,
}

impl LedgerError {
    /// Whether this error means the caller lacks admin authority.
    ///
    /// The automation treats this class as terminal (it stops polling
    /// instead of retrying forever).
    pub fn is_authorization(&self) -> bool {
        matches!(self, LedgerError::NotAdmin { .. })
    }
}
