//! The commit-reveal election state machine.
//!
//! All operations validate every guard before the first write, so a guard
//! violation leaves the ledger exactly as it was. The caller identity model
//! is deliberately simple: operations take the caller's identifier and the
//! ledger compares it against the admin configured at construction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use veil_crypto::accumulator::MembershipProof;
use veil_crypto::{commit_digest, verify_membership};
use veil_types::candidate::MAX_CANDIDATE_NAME_LEN;
use veil_types::{Candidate, CandidateId, CommitHash, Phase, RootHash, RoundId, VoterId};

use crate::error::LedgerError;
use crate::event::{ElectionEvent, EventLog, EventRecord};

/// A voter's commitment record for the current round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentRecord {
    pub voter: VoterId,
    pub hash: CommitHash,
    pub committed: bool,
    pub revealed: bool,
}

/// Read-side view of a voter's participation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterStatus {
    pub committed: bool,
    pub revealed: bool,
}

/// The authoritative election ledger.
///
/// `Clone` supports no-side-effect simulation: a transition is dry-run
/// against a copy and the copy is discarded.
#[derive(Clone)]
pub struct ElectionLedger {
    admin: VoterId,
    phase: Phase,
    round: RoundId,
    eligibility_root: RootHash,
    candidates: Vec<Candidate>,
    commitments: HashMap<VoterId, CommitmentRecord>,
    tally: Vec<u64>,
    events: EventLog,
}

impl ElectionLedger {
    /// Create a fresh ledger in the Commit phase of round 0 with the
    /// sentinel (empty) eligibility root published.
    pub fn new(admin: VoterId) -> Self {
        Self {
            admin,
            phase: Phase::Commit,
            round: RoundId::FIRST,
            eligibility_root: RootHash::ZERO,
            candidates: Vec::new(),
            commitments: HashMap::new(),
            tally: Vec::new(),
            events: EventLog::new(),
        }
    }

    // ── Guards ───────────────────────────────────────────────────────────

    fn require_admin(&self, caller: &VoterId) -> Result<(), LedgerError> {
        if caller != &self.admin {
            return Err(LedgerError::NotAdmin {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    fn require_phase(&self, expected: Phase) -> Result<(), LedgerError> {
        if self.phase != expected {
            return Err(LedgerError::WrongPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    // ── Admin operations ─────────────────────────────────────────────────

    /// Add a candidate to the ballot. Only during Commit; ids are assigned
    /// densely.
    pub fn add_candidate(
        &mut self,
        caller: &VoterId,
        name: &str,
    ) -> Result<CandidateId, LedgerError> {
        self.require_admin(caller)?;
        self.require_phase(Phase::Commit)?;
        if name.is_empty() || name.len() > MAX_CANDIDATE_NAME_LEN {
            return Err(LedgerError::InvalidNameLength {
                len: name.len(),
                max: MAX_CANDIDATE_NAME_LEN,
            });
        }

        let id = CandidateId::new(self.candidates.len() as u32);
        self.candidates.push(Candidate {
            id,
            name: name.to_string(),
            active: true,
        });
        self.tally.push(0);
        self.events.append(&ElectionEvent::CandidateAdded {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }

    /// Soft-delete a candidate. Allowed in any phase; the tally slot and id
    /// remain so ids stay dense. Removing an already-inactive candidate is
    /// a no-op.
    pub fn remove_candidate(
        &mut self,
        caller: &VoterId,
        id: CandidateId,
    ) -> Result<(), LedgerError> {
        self.require_admin(caller)?;
        let candidate = self
            .candidates
            .get_mut(id.index())
            .ok_or(LedgerError::UnknownCandidate(id))?;
        if candidate.active {
            candidate.active = false;
            self.events.append(&ElectionEvent::CandidateRemoved { id });
        }
        Ok(())
    }

    /// Publish a new eligibility root. Allowed in any phase; proofs are
    /// checked against the root in force at commit time, so already-accepted
    /// commitments are unaffected.
    pub fn set_eligibility_root(
        &mut self,
        caller: &VoterId,
        root: RootHash,
    ) -> Result<(), LedgerError> {
        self.require_admin(caller)?;
        self.eligibility_root = root;
        Ok(())
    }

    /// Advance Commit → Reveal.
    pub fn start_reveal(&mut self, caller: &VoterId) -> Result<(), LedgerError> {
        self.require_admin(caller)?;
        self.require_phase(Phase::Commit)?;
        self.phase = Phase::Reveal;
        self.events.append(&ElectionEvent::PhaseChanged {
            round: self.round,
            phase: Phase::Reveal,
        });
        Ok(())
    }

    /// Advance Reveal → Finished.
    pub fn finish_election(&mut self, caller: &VoterId) -> Result<(), LedgerError> {
        self.require_admin(caller)?;
        self.require_phase(Phase::Reveal)?;
        self.phase = Phase::Finished;
        self.events.append(&ElectionEvent::PhaseChanged {
            round: self.round,
            phase: Phase::Finished,
        });
        Ok(())
    }

    /// Start a new round: clear all commitments, zero the tally, reactivate
    /// every candidate, return to Commit, increment the round counter. Only
    /// valid from Finished.
    pub fn reset_election(&mut self, caller: &VoterId) -> Result<RoundId, LedgerError> {
        self.require_admin(caller)?;
        if self.phase != Phase::Finished {
            return Err(LedgerError::ResetBeforeFinish);
        }

        self.commitments.clear();
        for count in &mut self.tally {
            *count = 0;
        }
        for candidate in &mut self.candidates {
            candidate.active = true;
        }
        self.phase = Phase::Commit;
        self.round = self.round.next();
        self.events.append(&ElectionEvent::ElectionReset { round: self.round });
        Ok(self.round)
    }

    /// Physically remove every candidate. Only valid from Finished.
    pub fn clear_all_candidates(&mut self, caller: &VoterId) -> Result<(), LedgerError> {
        self.require_admin(caller)?;
        self.require_phase(Phase::Finished)?;
        let count = self.candidates.len() as u64;
        self.candidates.clear();
        self.tally.clear();
        self.events
            .append(&ElectionEvent::AllCandidatesCleared { count });
        Ok(())
    }

    // ── Voter operations ─────────────────────────────────────────────────

    /// Submit a hidden vote commitment with a membership proof against the
    /// currently published root.
    pub fn commit_vote(
        &mut self,
        voter: &VoterId,
        hash: CommitHash,
        proof: &MembershipProof,
    ) -> Result<(), LedgerError> {
        self.require_phase(Phase::Commit)?;
        if hash.is_zero() {
            return Err(LedgerError::EmptyCommitment);
        }
        if !verify_membership(voter, proof, &self.eligibility_root) {
            return Err(LedgerError::NotEligible {
                voter: voter.clone(),
            });
        }
        if self.commitments.contains_key(voter) {
            return Err(LedgerError::AlreadyCommitted {
                voter: voter.clone(),
            });
        }

        self.commitments.insert(
            voter.clone(),
            CommitmentRecord {
                voter: voter.clone(),
                hash,
                committed: true,
                revealed: false,
            },
        );
        self.events.append(&ElectionEvent::VoteCommitted {
            voter: voter.clone(),
            round: self.round,
            commitment: hash,
        });
        Ok(())
    }

    /// Disclose the committed choice. The digest is recomputed with the same
    /// construction used at commit time and must match the stored
    /// commitment exactly.
    pub fn reveal_vote(
        &mut self,
        voter: &VoterId,
        candidate: CandidateId,
        salt: &[u8],
    ) -> Result<(), LedgerError> {
        self.require_phase(Phase::Reveal)?;
        let record = self
            .commitments
            .get(voter)
            .ok_or_else(|| LedgerError::NoCommitment {
                voter: voter.clone(),
            })?;
        if record.revealed {
            return Err(LedgerError::AlreadyRevealed {
                voter: voter.clone(),
            });
        }
        let entry = self
            .candidates
            .get(candidate.index())
            .ok_or(LedgerError::UnknownCandidate(candidate))?;
        if !entry.active {
            return Err(LedgerError::InactiveCandidate(candidate));
        }
        if commit_digest(candidate, salt) != record.hash {
            return Err(LedgerError::CommitmentMismatch);
        }

        self.commitments
            .get_mut(voter)
            .expect("checked above")
            .revealed = true;
        self.tally[candidate.index()] += 1;
        self.events.append(&ElectionEvent::VoteRevealed {
            voter: voter.clone(),
            candidate,
        });
        Ok(())
    }

    // ── Reads (guard-free) ───────────────────────────────────────────────

    pub fn admin(&self) -> &VoterId {
        &self.admin
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> RoundId {
        self.round
    }

    pub fn eligibility_root(&self) -> RootHash {
        self.eligibility_root
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn tally(&self) -> &[u64] {
        &self.tally
    }

    pub fn voter_status(&self, voter: &VoterId) -> VoterStatus {
        match self.commitments.get(voter) {
            Some(record) => VoterStatus {
                committed: record.committed,
                revealed: record.revealed,
            },
            None => VoterStatus::default(),
        }
    }

    pub fn commitment(&self, voter: &VoterId) -> Option<&CommitmentRecord> {
        self.commitments.get(voter)
    }

    /// Paginated event-log read.
    pub fn events(&self, from: u64, limit: usize) -> Vec<EventRecord> {
        self.events.read(from, limit)
    }

    pub fn event_count(&self) -> u64 {
        self.events.len()
    }
}
