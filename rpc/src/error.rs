//! RPC error types and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use veil_automation::{AutomationError, BackendError};
use veil_ledger::LedgerError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Automation(#[from] AutomationError),
}

impl RpcError {
    fn status(&self) -> StatusCode {
        match self {
            RpcError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::Ledger(e) => ledger_status(e),
            RpcError::Automation(e) => match e {
                AutomationError::Backend(BackendError::Rejected(le)) => ledger_status(le),
                AutomationError::Backend(BackendError::Transient(_)) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                AutomationError::Backend(BackendError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
                AutomationError::RootDivergent { .. } => StatusCode::SERVICE_UNAVAILABLE,
                AutomationError::ScanInProgress(_) => StatusCode::CONFLICT,
                AutomationError::InvalidVoter(_) => StatusCode::BAD_REQUEST,
                AutomationError::Store(_)
                | AutomationError::EventDecode(_)
                | AutomationError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

fn ledger_status(e: &LedgerError) -> StatusCode {
    match e {
        LedgerError::NotAdmin { .. } | LedgerError::NotEligible { .. } => StatusCode::FORBIDDEN,
        LedgerError::WrongPhase { .. }
        | LedgerError::AlreadyCommitted { .. }
        | LedgerError::AlreadyRevealed { .. }
        | LedgerError::ResetBeforeFinish => StatusCode::CONFLICT,
        LedgerError::InvalidNameLength { .. }
        | LedgerError::UnknownCandidate(_)
        | LedgerError::InactiveCandidate(_)
        | LedgerError::EmptyCommitment
        | LedgerError::NoCommitment { .. }
        | LedgerError::CommitmentMismatch => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
