//! Append-only event log with versioned payload codecs.
//!
//! Each record carries a discriminator tag and an opaque payload. Payload
//! encodings have drifted over the system's history: numeric fields were
//! originally 32-bit ("narrow") and are 64-bit ("wide") today. Writers emit
//! the wide encoding; readers attempt each known schema in order (wide
//! first, then narrow) and accept the first that decodes. Legacy records
//! are preserved as written, never migrated.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use veil_types::{CandidateId, CommitHash, Phase, RoundId, VoterId};

/// Discriminator tag for event records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    PhaseChanged,
    CandidateAdded,
    CandidateRemoved,
    VoteCommitted,
    VoteRevealed,
    ElectionReset,
    AllCandidatesCleared,
}

/// A raw log entry: offset, discriminator, encoded payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub offset: u64,
    pub kind: EventKind,
    pub payload: Vec<u8>,
}

/// A decoded change notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElectionEvent {
    PhaseChanged { round: RoundId, phase: Phase },
    CandidateAdded { id: CandidateId, name: String },
    CandidateRemoved { id: CandidateId },
    VoteCommitted { voter: VoterId, round: RoundId, commitment: CommitHash },
    VoteRevealed { voter: VoterId, candidate: CandidateId },
    ElectionReset { round: RoundId },
    AllCandidatesCleared { count: u64 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventDecodeError {
    #[error("payload for {kind:?} at offset {offset} matches no known encoding")]
    UnknownEncoding { kind: EventKind, offset: u64 },

    #[error("payload for {kind:?} at offset {offset} carries an invalid voter id")]
    InvalidVoter { kind: EventKind, offset: u64 },
}

// ── Payload schemas ──────────────────────────────────────────────────────
//
// One struct per (event, width) pair. The narrow variants exist only so
// historical records keep decoding; new records are always wide.

#[derive(Serialize, Deserialize)]
struct PhaseChangedWide {
    round: u64,
    phase: Phase,
}

#[derive(Serialize, Deserialize)]
struct PhaseChangedNarrow {
    round: u32,
    phase: Phase,
}

#[derive(Serialize, Deserialize)]
struct CandidateAddedWide {
    id: u64,
    name: String,
}

#[derive(Serialize, Deserialize)]
struct CandidateAddedNarrow {
    id: u32,
    name: String,
}

#[derive(Serialize, Deserialize)]
struct CandidateRemovedWide {
    id: u64,
}

#[derive(Serialize, Deserialize)]
struct CandidateRemovedNarrow {
    id: u32,
}

#[derive(Serialize, Deserialize)]
struct VoteCommittedWide {
    voter: String,
    round: u64,
    commitment: [u8; 32],
}

#[derive(Serialize, Deserialize)]
struct VoteCommittedNarrow {
    voter: String,
    round: u32,
    commitment: [u8; 32],
}

#[derive(Serialize, Deserialize)]
struct VoteRevealedWide {
    voter: String,
    candidate: u64,
}

#[derive(Serialize, Deserialize)]
struct VoteRevealedNarrow {
    voter: String,
    candidate: u32,
}

#[derive(Serialize, Deserialize)]
struct ElectionResetWide {
    round: u64,
}

#[derive(Serialize, Deserialize)]
struct ElectionResetNarrow {
    round: u32,
}

#[derive(Serialize, Deserialize)]
struct AllCandidatesClearedWide {
    count: u64,
}

#[derive(Serialize, Deserialize)]
struct AllCandidatesClearedNarrow {
    count: u32,
}

fn encode<T: Serialize>(value: &T) -> Vec<u8> {
    bincode::serialize(value).expect("in-memory payload serialization cannot fail")
}

/// Decode with an exact-consumption check: bincode tolerates trailing bytes,
/// which would let a wide payload wrongly satisfy a narrow schema. Reject
/// any decode whose canonical re-encoding is shorter than the input.
fn decode_exact<'a, T: Deserialize<'a> + Serialize>(bytes: &'a [u8]) -> Option<T> {
    let value: T = bincode::deserialize(bytes).ok()?;
    if bincode::serialized_size(&value).ok()? != bytes.len() as u64 {
        return None;
    }
    Some(value)
}

impl ElectionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ElectionEvent::PhaseChanged { .. } => EventKind::PhaseChanged,
            ElectionEvent::CandidateAdded { .. } => EventKind::CandidateAdded,
            ElectionEvent::CandidateRemoved { .. } => EventKind::CandidateRemoved,
            ElectionEvent::VoteCommitted { .. } => EventKind::VoteCommitted,
            ElectionEvent::VoteRevealed { .. } => EventKind::VoteRevealed,
            ElectionEvent::ElectionReset { .. } => EventKind::ElectionReset,
            ElectionEvent::AllCandidatesCleared { .. } => EventKind::AllCandidatesCleared,
        }
    }

    /// Encode in the current (wide) schema.
    pub fn encode_payload(&self) -> Vec<u8> {
        match self {
            ElectionEvent::PhaseChanged { round, phase } => encode(&PhaseChangedWide {
                round: round.as_u64(),
                phase: *phase,
            }),
            ElectionEvent::CandidateAdded { id, name } => encode(&CandidateAddedWide {
                id: id.as_u32() as u64,
                name: name.clone(),
            }),
            ElectionEvent::CandidateRemoved { id } => encode(&CandidateRemovedWide {
                id: id.as_u32() as u64,
            }),
            ElectionEvent::VoteCommitted {
                voter,
                round,
                commitment,
            } => encode(&VoteCommittedWide {
                voter: voter.to_string(),
                round: round.as_u64(),
                commitment: *commitment.as_bytes(),
            }),
            ElectionEvent::VoteRevealed { voter, candidate } => encode(&VoteRevealedWide {
                voter: voter.to_string(),
                candidate: candidate.as_u32() as u64,
            }),
            ElectionEvent::ElectionReset { round } => encode(&ElectionResetWide {
                round: round.as_u64(),
            }),
            ElectionEvent::AllCandidatesCleared { count } => {
                encode(&AllCandidatesClearedWide { count: *count })
            }
        }
    }

    /// Encode in the legacy (narrow) schema. Used by tests and replay
    /// fixtures; production writers stopped emitting this format.
    pub fn encode_payload_narrow(&self) -> Vec<u8> {
        match self {
            ElectionEvent::PhaseChanged { round, phase } => encode(&PhaseChangedNarrow {
                round: round.as_u64() as u32,
                phase: *phase,
            }),
            ElectionEvent::CandidateAdded { id, name } => encode(&CandidateAddedNarrow {
                id: id.as_u32(),
                name: name.clone(),
            }),
            ElectionEvent::CandidateRemoved { id } => {
                encode(&CandidateRemovedNarrow { id: id.as_u32() })
            }
            ElectionEvent::VoteCommitted {
                voter,
                round,
                commitment,
            } => encode(&VoteCommittedNarrow {
                voter: voter.to_string(),
                round: round.as_u64() as u32,
                commitment: *commitment.as_bytes(),
            }),
            ElectionEvent::VoteRevealed { voter, candidate } => encode(&VoteRevealedNarrow {
                voter: voter.to_string(),
                candidate: candidate.as_u32(),
            }),
            ElectionEvent::ElectionReset { round } => encode(&ElectionResetNarrow {
                round: round.as_u64() as u32,
            }),
            ElectionEvent::AllCandidatesCleared { count } => {
                encode(&AllCandidatesClearedNarrow {
                    count: *count as u32,
                })
            }
        }
    }
}

impl EventRecord {
    /// Decode the payload, attempting each known schema in order (wide,
    /// then narrow).
    pub fn decode(&self) -> Result<ElectionEvent, EventDecodeError> {
        let unknown = || EventDecodeError::UnknownEncoding {
            kind: self.kind,
            offset: self.offset,
        };
        let parse_voter = |raw: String| {
            VoterId::parse(&raw).map_err(|_| EventDecodeError::InvalidVoter {
                kind: self.kind,
                offset: self.offset,
            })
        };

        match self.kind {
            EventKind::PhaseChanged => {
                if let Some(p) = decode_exact::<PhaseChangedWide>(&self.payload) {
                    return Ok(ElectionEvent::PhaseChanged {
                        round: RoundId::new(p.round),
                        phase: p.phase,
                    });
                }
                let p = decode_exact::<PhaseChangedNarrow>(&self.payload).ok_or_else(unknown)?;
                Ok(ElectionEvent::PhaseChanged {
                    round: RoundId::new(p.round as u64),
                    phase: p.phase,
                })
            }
            EventKind::CandidateAdded => {
                if let Some(p) = decode_exact::<CandidateAddedWide>(&self.payload) {
                    return Ok(ElectionEvent::CandidateAdded {
                        id: CandidateId::new(p.id as u32),
                        name: p.name,
                    });
                }
                let p = decode_exact::<CandidateAddedNarrow>(&self.payload).ok_or_else(unknown)?;
                Ok(ElectionEvent::CandidateAdded {
                    id: CandidateId::new(p.id),
                    name: p.name,
                })
            }
            EventKind::CandidateRemoved => {
                if let Some(p) = decode_exact::<CandidateRemovedWide>(&self.payload) {
                    return Ok(ElectionEvent::CandidateRemoved {
                        id: CandidateId::new(p.id as u32),
                    });
                }
                let p =
                    decode_exact::<CandidateRemovedNarrow>(&self.payload).ok_or_else(unknown)?;
                Ok(ElectionEvent::CandidateRemoved {
                    id: CandidateId::new(p.id),
                })
            }
            EventKind::VoteCommitted => {
                if let Some(p) = decode_exact::<VoteCommittedWide>(&self.payload) {
                    return Ok(ElectionEvent::VoteCommitted {
                        voter: parse_voter(p.voter)?,
                        round: RoundId::new(p.round),
                        commitment: CommitHash::new(p.commitment),
                    });
                }
                let p = decode_exact::<VoteCommittedNarrow>(&self.payload).ok_or_else(unknown)?;
                Ok(ElectionEvent::VoteCommitted {
                    voter: parse_voter(p.voter)?,
                    round: RoundId::new(p.round as u64),
                    commitment: CommitHash::new(p.commitment),
                })
            }
            EventKind::VoteRevealed => {
                if let Some(p) = decode_exact::<VoteRevealedWide>(&self.payload) {
                    return Ok(ElectionEvent::VoteRevealed {
                        voter: parse_voter(p.voter)?,
                        candidate: CandidateId::new(p.candidate as u32),
                    });
                }
                let p = decode_exact::<VoteRevealedNarrow>(&self.payload).ok_or_else(unknown)?;
                Ok(ElectionEvent::VoteRevealed {
                    voter: parse_voter(p.voter)?,
                    candidate: CandidateId::new(p.candidate),
                })
            }
            EventKind::ElectionReset => {
                if let Some(p) = decode_exact::<ElectionResetWide>(&self.payload) {
                    return Ok(ElectionEvent::ElectionReset {
                        round: RoundId::new(p.round),
                    });
                }
                let p = decode_exact::<ElectionResetNarrow>(&self.payload).ok_or_else(unknown)?;
                Ok(ElectionEvent::ElectionReset {
                    round: RoundId::new(p.round as u64),
                })
            }
            EventKind::AllCandidatesCleared => {
                if let Some(p) = decode_exact::<AllCandidatesClearedWide>(&self.payload) {
                    return Ok(ElectionEvent::AllCandidatesCleared { count: p.count });
                }
                let p = decode_exact::<AllCandidatesClearedNarrow>(&self.payload)
                    .ok_or_else(unknown)?;
                Ok(ElectionEvent::AllCandidatesCleared {
                    count: p.count as u64,
                })
            }
        }
    }
}

/// The in-ledger append-only log.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, assigning the next offset.
    pub fn append(&mut self, event: &ElectionEvent) -> u64 {
        let offset = self.records.len() as u64;
        self.records.push(EventRecord {
            offset,
            kind: event.kind(),
            payload: event.encode_payload(),
        });
        offset
    }

    /// Read up to `limit` records starting at `from` (inclusive).
    pub fn read(&self, from: u64, limit: usize) -> Vec<EventRecord> {
        let start = (from as usize).min(self.records.len());
        let end = start.saturating_add(limit).min(self.records.len());
        self.records[start..end].to_vec()
    }

    pub fn len(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voter(name: &str) -> VoterId {
        VoterId::parse(name).unwrap()
    }

    #[test]
    fn wide_payloads_roundtrip() {
        let events = vec![
            ElectionEvent::PhaseChanged {
                round: RoundId::new(3),
                phase: Phase::Reveal,
            },
            ElectionEvent::CandidateAdded {
                id: CandidateId::new(2),
                name: "alice".into(),
            },
            ElectionEvent::CandidateRemoved {
                id: CandidateId::new(1),
            },
            ElectionEvent::VoteCommitted {
                voter: voter("v1"),
                round: RoundId::new(3),
                commitment: CommitHash::new([7u8; 32]),
            },
            ElectionEvent::VoteRevealed {
                voter: voter("v1"),
                candidate: CandidateId::new(2),
            },
            ElectionEvent::ElectionReset {
                round: RoundId::new(4),
            },
            ElectionEvent::AllCandidatesCleared { count: 5 },
        ];
        for (i, event) in events.iter().enumerate() {
            let record = EventRecord {
                offset: i as u64,
                kind: event.kind(),
                payload: event.encode_payload(),
            };
            assert_eq!(&record.decode().unwrap(), event);
        }
    }

    #[test]
    fn narrow_payloads_decode_to_same_logical_event() {
        let events = vec![
            ElectionEvent::PhaseChanged {
                round: RoundId::new(1),
                phase: Phase::Finished,
            },
            ElectionEvent::VoteCommitted {
                voter: voter("legacy"),
                round: RoundId::new(0),
                commitment: CommitHash::new([9u8; 32]),
            },
            ElectionEvent::VoteRevealed {
                voter: voter("legacy"),
                candidate: CandidateId::new(1),
            },
            ElectionEvent::ElectionReset {
                round: RoundId::new(2),
            },
        ];
        for event in &events {
            let record = EventRecord {
                offset: 0,
                kind: event.kind(),
                payload: event.encode_payload_narrow(),
            };
            assert_eq!(&record.decode().unwrap(), event, "narrow {:?}", event.kind());
        }
    }

    #[test]
    fn garbage_payload_is_unknown_encoding() {
        let record = EventRecord {
            offset: 12,
            kind: EventKind::VoteRevealed,
            payload: vec![0xff, 0x01],
        };
        assert_eq!(
            record.decode(),
            Err(EventDecodeError::UnknownEncoding {
                kind: EventKind::VoteRevealed,
                offset: 12,
            })
        );
    }

    #[test]
    fn log_reads_are_bounded_and_offset_stable() {
        let mut log = EventLog::new();
        for i in 0..10u64 {
            let offset = log.append(&ElectionEvent::ElectionReset {
                round: RoundId::new(i),
            });
            assert_eq!(offset, i);
        }
        let page = log.read(4, 3);
        assert_eq!(page.len(), 3);
        assert_eq!(page[0].offset, 4);
        assert_eq!(page[2].offset, 6);
        assert!(log.read(10, 5).is_empty());
        assert_eq!(log.read(8, 100).len(), 2);
    }
}
