use proptest::prelude::*;

use veil_types::{CommitHash, Phase, RootHash, Timestamp, VoterId};

proptest! {
    /// RootHash roundtrip: new -> as_bytes -> new produces identical hash.
    #[test]
    fn root_hash_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let hash = RootHash::new(bytes);
        prop_assert_eq!(hash.as_bytes(), &bytes);
    }

    /// RootHash::is_zero is true only for all-zero bytes.
    #[test]
    fn root_hash_is_zero_correct(bytes in prop::array::uniform32(0u8..)) {
        let hash = RootHash::new(bytes);
        prop_assert_eq!(hash.is_zero(), bytes == [0u8; 32]);
    }

    /// RootHash hex display parses back to the same digest.
    #[test]
    fn root_hash_hex_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let hash = RootHash::new(bytes);
        prop_assert_eq!(RootHash::from_hex(&hash.to_string()), Some(hash));
    }

    /// CommitHash bincode serialization roundtrip.
    #[test]
    fn commit_hash_bincode_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let hash = CommitHash::new(bytes);
        let encoded = bincode::serialize(&hash).unwrap();
        let decoded: CommitHash = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded.as_bytes(), hash.as_bytes());
    }

    /// Timestamp ordering matches the underlying seconds.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ta = Timestamp::new(a);
        let tb = Timestamp::new(b);
        prop_assert_eq!(ta <= tb, a <= b);
        prop_assert_eq!(ta == tb, a == b);
    }

    /// Parsing a voter id is idempotent: parsing the canonical form again
    /// yields the same identifier.
    #[test]
    fn voter_id_canonicalization_idempotent(raw in "[A-Za-z0-9_-]{1,64}") {
        let first = VoterId::parse(&raw).unwrap();
        let second = VoterId::parse(first.as_str()).unwrap();
        prop_assert_eq!(first, second);
    }
}

/// Observed phase sequences are always a subsequence of
/// Commit, Reveal, Finished.
#[test]
fn phase_chain_is_total() {
    let mut phase = Phase::Commit;
    let mut seen = vec![phase];
    while let Some(next) = phase.next() {
        seen.push(next);
        phase = next;
    }
    assert_eq!(seen, vec![Phase::Commit, Phase::Reveal, Phase::Finished]);
}
