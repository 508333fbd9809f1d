//! Unattended election automation.
//!
//! Three cooperating engines over the ledger backend:
//!
//! - [`PhaseScheduler`] advances the round through Commit → Reveal →
//!   Finished (→ optional auto-reset) on a wall-clock schedule, simulating
//!   each transition before submitting it.
//! - [`RootSynchronizer`] keeps the ledger's published eligibility root in
//!   step with the authoritative allow-list, retrying only transient
//!   backend faults.
//! - [`TallyProjector`] maintains a durable, resumable projection of the
//!   ledger's event log.
//!
//! All time-dependent logic takes an injected `now`, so every engine is
//! deterministic under test.

pub mod backend;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod projector;
pub mod schedule;
pub mod scheduler;
pub mod status;
pub mod synchronizer;

pub use backend::{BackendError, FaultPoint, InjectedFault, LedgerBackend, Transition};
pub use config::{AutomationConfig, RetryPolicy, StartMode};
pub use eligibility::{AdmissionOutcome, EligibilityIndex, EligibilityService};
pub use error::AutomationError;
pub use projector::{ScanReport, TallyProjector};
pub use schedule::ScheduleState;
pub use scheduler::PhaseScheduler;
pub use status::AutomationStatus;
pub use synchronizer::{RootSynchronizer, SyncOutcome};
