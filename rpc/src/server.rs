//! Axum-based HTTP server.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tracing::info;

use veil_automation::{
    AutomationError, EligibilityService, LedgerBackend, PhaseScheduler, TallyProjector,
};
use veil_crypto::accumulator::MembershipProof;
use veil_types::{CandidateId, CommitHash, Timestamp, VoterId};

use crate::error::RpcError;
use crate::handlers::*;
use crate::pagination::{next_cursor, PaginationMeta, PaginationParams};

/// Shared state behind every handler.
pub struct AppState {
    pub backend: LedgerBackend,
    pub scheduler: Arc<PhaseScheduler>,
    pub eligibility: Arc<EligibilityService>,
    pub projector: Arc<TallyProjector>,
    pub election_id: String,
    pub started_at: Timestamp,
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/root", get(published_root))
        .route("/api/proof", get(eligibility_proof))
        .route("/api/admit", post(admit))
        .route("/api/status", get(automation_status))
        .route("/api/tick", post(tick))
        .route("/api/commit", post(commit_vote))
        .route("/api/reveal", post(reveal_vote))
        .route("/api/voter_status", get(voter_status))
        .route("/api/candidates", get(candidates))
        .route("/api/tally", get(tally))
        .route("/api/projection", get(projection))
        .route("/api/events", get(events))
        .route("/api/admin/candidate", post(add_candidate))
        .route("/api/admin/remove_candidate", post(remove_candidate))
        .route("/api/admin/start_reveal", post(start_reveal))
        .route("/api/admin/finish", post(finish_election))
        .route("/api/admin/reset", post(reset_election))
        .route("/api/admin/clear_candidates", post(clear_candidates))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// The HTTP server.
pub struct RpcServer {
    pub port: u16,
}

impl RpcServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// Bind and serve until the process exits.
    pub async fn start(&self, state: Arc<AppState>) -> Result<(), std::io::Error> {
        let listener =
            tokio::net::TcpListener::bind(("0.0.0.0", self.port)).await?;
        info!(port = self.port, "rpc server listening");
        axum::serve(listener, router(state)).await
    }
}

// ── Input parsing helpers ────────────────────────────────────────────────

fn parse_voter(raw: &str) -> Result<VoterId, RpcError> {
    VoterId::parse(raw).map_err(|e| RpcError::InvalidRequest(e.to_string()))
}

fn parse_digest(raw: &str) -> Result<CommitHash, RpcError> {
    CommitHash::from_hex(raw)
        .ok_or_else(|| RpcError::InvalidRequest("expected a 32-byte hex digest".into()))
}

fn parse_proof(siblings: &[String]) -> Result<MembershipProof, RpcError> {
    let mut parsed = Vec::with_capacity(siblings.len());
    for raw in siblings {
        let stripped = raw.strip_prefix("0x").unwrap_or(raw);
        let bytes = hex::decode(stripped)
            .map_err(|_| RpcError::InvalidRequest("proof element is not hex".into()))?;
        let node: [u8; 32] = bytes
            .try_into()
            .map_err(|_| RpcError::InvalidRequest("proof element is not 32 bytes".into()))?;
        parsed.push(node);
    }
    Ok(MembershipProof::from_siblings(parsed))
}

/// The caller identity for admin/ledger operations, from the
/// `x-caller-id` header. Authorization itself is the ledger's job.
fn caller(headers: &HeaderMap) -> Result<VoterId, RpcError> {
    let raw = headers
        .get("x-caller-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| RpcError::InvalidRequest("missing x-caller-id header".into()))?;
    parse_voter(raw)
}

// ── Eligibility handlers ─────────────────────────────────────────────────

async fn eligibility_proof(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VoterQuery>,
) -> Result<Json<ProofResponse>, RpcError> {
    let voter = parse_voter(&query.voter_id)?;
    let proof = state
        .eligibility
        .proof(&voter)
        .await?
        .ok_or(RpcError::Ledger(veil_ledger::LedgerError::NotEligible {
            voter,
        }))?;
    let root = state.eligibility.index().root()?;
    Ok(Json(ProofResponse {
        proof: proof.siblings().iter().map(hex::encode).collect(),
        root: root.to_string(),
    }))
}

async fn published_root(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RootResponse>, RpcError> {
    let root = state
        .backend
        .published_root()
        .await
        .map_err(AutomationError::from)?;
    Ok(Json(RootResponse {
        root: root.to_string(),
    }))
}

async fn admit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AdmitRequest>,
) -> Result<Json<AdmitResponse>, RpcError> {
    let voter = parse_voter(&request.voter_id)?;
    let outcome = state.eligibility.admit(&voter).await?;
    // The admission event is what starts the commit clock in
    // on-first-join mode.
    state.scheduler.notify_joined();
    Ok(Json(AdmitResponse {
        added: outcome.added,
        sync: outcome.sync,
    }))
}

// ── Automation handlers ──────────────────────────────────────────────────

async fn automation_status(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, RpcError> {
    let phase = state
        .backend
        .phase()
        .await
        .map_err(AutomationError::from)?;
    Ok(Json(state.scheduler.status(phase, Timestamp::now())))
}

async fn tick(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, RpcError> {
    state.scheduler.tick().await?;
    let phase = state
        .backend
        .phase()
        .await
        .map_err(AutomationError::from)?;
    Ok(Json(state.scheduler.status(phase, Timestamp::now())))
}

// ── Voting handlers ──────────────────────────────────────────────────────

async fn commit_vote(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CommitRequest>,
) -> Result<Json<OkResponse>, RpcError> {
    let voter = parse_voter(&request.voter_id)?;
    let commitment = parse_digest(&request.commitment)?;
    let proof = parse_proof(&request.proof)?;

    let ledger = state.backend.ledger();
    let mut ledger = ledger.lock().await;
    ledger.commit_vote(&voter, commitment, &proof)?;
    Ok(Json(OkResponse::new("committed")))
}

async fn reveal_vote(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RevealRequest>,
) -> Result<Json<OkResponse>, RpcError> {
    let voter = parse_voter(&request.voter_id)?;

    let ledger = state.backend.ledger();
    let mut ledger = ledger.lock().await;
    ledger.reveal_vote(
        &voter,
        CandidateId::new(request.candidate_id),
        request.salt.as_bytes(),
    )?;
    Ok(Json(OkResponse::new("revealed")))
}

async fn voter_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VoterQuery>,
) -> Result<Json<VoterStatusResponse>, RpcError> {
    let voter = parse_voter(&query.voter_id)?;
    let ledger = state.backend.ledger();
    let ledger = ledger.lock().await;
    let status = ledger.voter_status(&voter);
    Ok(Json(VoterStatusResponse {
        committed: status.committed,
        revealed: status.revealed,
    }))
}

// ── Result handlers ──────────────────────────────────────────────────────

async fn candidates(State(state): State<Arc<AppState>>) -> Json<CandidatesResponse> {
    let ledger = state.backend.ledger();
    let ledger = ledger.lock().await;
    Json(CandidatesResponse {
        candidates: ledger.candidates().iter().map(CandidateView::from).collect(),
    })
}

async fn tally(State(state): State<Arc<AppState>>) -> Json<TallyResponse> {
    let ledger = state.backend.ledger();
    let ledger = ledger.lock().await;
    Json(TallyResponse {
        phase: ledger.phase().as_str().to_string(),
        round: ledger.round().as_u64(),
        tally: ledger.tally().to_vec(),
    })
}

async fn projection(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProjectionResponse>, RpcError> {
    // Advance the projection opportunistically; a concurrent scan already
    // running for this key serves the stored snapshot instead.
    let report = match state.projector.scan(&state.election_id).await {
        Ok(report) => report,
        Err(AutomationError::ScanInProgress(_)) => {
            let snapshot = state.projector.current(&state.election_id)?;
            return Ok(Json(ProjectionResponse {
                committed_count: snapshot.committed_count,
                revealed_count: snapshot.revealed_count,
                per_candidate_votes: snapshot.per_candidate_votes,
                last_processed_offset: snapshot.last_processed_offset,
                caught_up: false,
            }));
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Json(ProjectionResponse {
        committed_count: report.snapshot.committed_count,
        revealed_count: report.snapshot.revealed_count,
        per_candidate_votes: report.snapshot.per_candidate_votes,
        last_processed_offset: report.snapshot.last_processed_offset,
        caught_up: report.caught_up,
    }))
}

async fn events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<EventsResponse>, RpcError> {
    let offset = params.decode_offset();
    let count = params.effective_count();
    let records = state
        .backend
        .events(offset, count as usize)
        .await
        .map_err(AutomationError::from)?;

    let mut views = Vec::with_capacity(records.len());
    for record in &records {
        let event = record.decode().map_err(AutomationError::from)?;
        views.push(EventView::from_event(record.offset, &event));
    }
    let cursor = next_cursor(offset, records.len(), count);
    Ok(Json(EventsResponse {
        events: views,
        pagination: PaginationMeta { cursor },
    }))
}

// ── Admin handlers ───────────────────────────────────────────────────────

async fn add_candidate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<AddCandidateRequest>,
) -> Result<Json<AddCandidateResponse>, RpcError> {
    let caller = caller(&headers)?;
    let ledger = state.backend.ledger();
    let mut ledger = ledger.lock().await;
    let id = ledger.add_candidate(&caller, &request.name)?;
    Ok(Json(AddCandidateResponse { id: id.as_u32() }))
}

async fn remove_candidate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RemoveCandidateRequest>,
) -> Result<Json<OkResponse>, RpcError> {
    let caller = caller(&headers)?;
    let ledger = state.backend.ledger();
    let mut ledger = ledger.lock().await;
    ledger.remove_candidate(&caller, CandidateId::new(request.id))?;
    Ok(Json(OkResponse::new("removed")))
}

async fn start_reveal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<OkResponse>, RpcError> {
    let caller = caller(&headers)?;
    let ledger = state.backend.ledger();
    let mut ledger = ledger.lock().await;
    ledger.start_reveal(&caller)?;
    Ok(Json(OkResponse::new("reveal_started")))
}

async fn finish_election(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<OkResponse>, RpcError> {
    let caller = caller(&headers)?;
    let ledger = state.backend.ledger();
    let mut ledger = ledger.lock().await;
    ledger.finish_election(&caller)?;
    Ok(Json(OkResponse::new("finished")))
}

async fn reset_election(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<OkResponse>, RpcError> {
    let caller = caller(&headers)?;
    let ledger = state.backend.ledger();
    let mut ledger = ledger.lock().await;
    ledger.reset_election(&caller)?;
    Ok(Json(OkResponse::new("reset")))
}

async fn clear_candidates(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<OkResponse>, RpcError> {
    let caller = caller(&headers)?;
    let ledger = state.backend.ledger();
    let mut ledger = ledger.lock().await;
    ledger.clear_all_candidates(&caller)?;
    Ok(Json(OkResponse::new("cleared")))
}

// ── Health ───────────────────────────────────────────────────────────────

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, RpcError> {
    let ledger = state.backend.ledger();
    let ledger = ledger.lock().await;
    Ok(Json(HealthResponse {
        status: "ok",
        phase: ledger.phase().as_str().to_string(),
        round: ledger.round().as_u64(),
        root: ledger.eligibility_root().to_string(),
        uptime_secs: Timestamp::now()
            .as_secs()
            .saturating_sub(state.started_at.as_secs()),
    }))
}
