//! The authoritative commit-reveal election ledger.
//!
//! A single serialized state machine: candidates, phase, per-voter
//! commitment records, and the tally. Every mutation is guarded and atomic:
//! a guard violation aborts the call with no partial effects. Successful
//! mutations append change notifications to an append-only event log that
//! read-side projections scan incrementally.

pub mod election;
pub mod error;
pub mod event;

pub use election::{CommitmentRecord, ElectionLedger, VoterStatus};
pub use error::LedgerError;
pub use event::{ElectionEvent, EventDecodeError, EventKind, EventLog, EventRecord};
