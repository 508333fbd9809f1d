//! HTTP API for the VEIL election engine.
//!
//! Provides endpoints for:
//! - Eligibility proofs and the published accumulator root
//! - Voter admission (identity-proofing collaborator)
//! - Vote commit / reveal passthrough to the ledger
//! - Automation status and the manual scheduler wake
//! - Candidates, tally, projection, and paginated event reads
//! - Admin candidate management and manual phase transitions

pub mod error;
pub mod handlers;
pub mod pagination;
pub mod server;

pub use error::RpcError;
pub use server::{router, AppState, RpcServer};
