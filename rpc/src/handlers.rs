//! API request and response types.

use serde::{Deserialize, Serialize};

use veil_automation::SyncOutcome;
use veil_ledger::ElectionEvent;
use veil_types::Candidate;

use crate::pagination::PaginationMeta;

// ── Eligibility ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct VoterQuery {
    pub voter_id: String,
}

#[derive(Serialize)]
pub struct ProofResponse {
    /// Sibling path, leaf-to-root, hex encoded.
    pub proof: Vec<String>,
    /// The allow-list root the proof verifies under.
    pub root: String,
}

#[derive(Serialize)]
pub struct RootResponse {
    pub root: String,
}

#[derive(Deserialize)]
pub struct AdmitRequest {
    pub voter_id: String,
}

#[derive(Serialize)]
pub struct AdmitResponse {
    /// False when the identifier was already admitted.
    pub added: bool,
    #[serde(flatten)]
    pub sync: SyncOutcome,
}

// ── Voting ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CommitRequest {
    pub voter_id: String,
    /// 32-byte commitment digest, hex encoded.
    pub commitment: String,
    /// Sibling path from the proof endpoint, hex encoded.
    pub proof: Vec<String>,
}

#[derive(Deserialize)]
pub struct RevealRequest {
    pub voter_id: String,
    pub candidate_id: u32,
    pub salt: String,
}

#[derive(Serialize)]
pub struct VoterStatusResponse {
    pub committed: bool,
    pub revealed: bool,
}

// ── Results ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct CandidateView {
    pub id: u32,
    pub name: String,
    pub active: bool,
}

impl From<&Candidate> for CandidateView {
    fn from(c: &Candidate) -> Self {
        Self {
            id: c.id.as_u32(),
            name: c.name.clone(),
            active: c.active,
        }
    }
}

#[derive(Serialize)]
pub struct CandidatesResponse {
    pub candidates: Vec<CandidateView>,
}

#[derive(Serialize)]
pub struct TallyResponse {
    pub phase: String,
    pub round: u64,
    pub tally: Vec<u64>,
}

#[derive(Serialize)]
pub struct ProjectionResponse {
    pub committed_count: u64,
    pub revealed_count: u64,
    pub per_candidate_votes: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_processed_offset: Option<u64>,
    pub caught_up: bool,
}

// ── Events ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct EventView {
    pub offset: u64,
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commitment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl EventView {
    pub fn from_event(offset: u64, event: &ElectionEvent) -> Self {
        let mut view = Self {
            offset,
            kind: "",
            round: None,
            phase: None,
            voter: None,
            candidate: None,
            name: None,
            commitment: None,
            count: None,
        };
        match event {
            ElectionEvent::PhaseChanged { round, phase } => {
                view.kind = "phase_changed";
                view.round = Some(round.as_u64());
                view.phase = Some(phase.as_str().to_string());
            }
            ElectionEvent::CandidateAdded { id, name } => {
                view.kind = "candidate_added";
                view.candidate = Some(id.as_u32());
                view.name = Some(name.clone());
            }
            ElectionEvent::CandidateRemoved { id } => {
                view.kind = "candidate_removed";
                view.candidate = Some(id.as_u32());
            }
            ElectionEvent::VoteCommitted {
                voter,
                round,
                commitment,
            } => {
                view.kind = "vote_committed";
                view.voter = Some(voter.to_string());
                view.round = Some(round.as_u64());
                view.commitment = Some(commitment.to_string());
            }
            ElectionEvent::VoteRevealed { voter, candidate } => {
                view.kind = "vote_revealed";
                view.voter = Some(voter.to_string());
                view.candidate = Some(candidate.as_u32());
            }
            ElectionEvent::ElectionReset { round } => {
                view.kind = "election_reset";
                view.round = Some(round.as_u64());
            }
            ElectionEvent::AllCandidatesCleared { count } => {
                view.kind = "all_candidates_cleared";
                view.count = Some(*count);
            }
        }
        view
    }
}

#[derive(Serialize)]
pub struct EventsResponse {
    pub events: Vec<EventView>,
    #[serde(flatten)]
    pub pagination: PaginationMeta,
}

// ── Admin ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AddCandidateRequest {
    pub name: String,
}

#[derive(Serialize)]
pub struct AddCandidateResponse {
    pub id: u32,
}

#[derive(Deserialize)]
pub struct RemoveCandidateRequest {
    pub id: u32,
}

#[derive(Serialize)]
pub struct OkResponse {
    pub status: &'static str,
}

impl OkResponse {
    pub fn new(status: &'static str) -> Self {
        Self { status }
    }
}

// ── Health ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub phase: String,
    pub round: u64,
    pub root: String,
    pub uptime_secs: u64,
}
