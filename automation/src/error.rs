use thiserror::Error;
use veil_types::RootHash;

use crate::backend::BackendError;

#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("store error: {0}")]
    Store(#[from] veil_store::StoreError),

    #[error("event log decode error: {0}")]
    EventDecode(#[from] veil_ledger::EventDecodeError),

    #[error("published root {published} still diverges from allow-list root {local} after update")]
    RootDivergent {
        local: RootHash,
        published: RootHash,
    },

    #[error("a scan for election {0} is already in progress")]
    ScanInProgress(String),

    #[error("invalid voter identifier: {0}")]
    InvalidVoter(#[from] veil_types::VoterIdError),

    #[error("config error: {0}")]
    Config(String),
}
