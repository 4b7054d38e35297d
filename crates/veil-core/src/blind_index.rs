//! Blind indexing for watchlist identifiers
//!
//! A blind index is a salted, domain-separated SHA-256 of a sensitive field.
//! Watchlists hold only blind indexes, never plaintext names or IDs; an
//! evaluator derives its candidate's index with the same salt and feeds the
//! bits into the membership circuit.

use serde::{Deserialize, Serialize};

use crate::ct;
use crate::hash::{hex_bytes_32, sha256_multi};

/// Domain separator for blind index derivation
const BLIND_INDEX_DOMAIN: &[u8] = b"veil/blind-index/v1";

/// Salted hash of a sensitive identifier (32 bytes)
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct BlindIndex(#[serde(with = "hex_bytes_32")] [u8; 32]);

impl BlindIndex {
    /// Derive the blind index of `value` under `salt`
    pub fn create(value: &str, salt: &[u8]) -> Self {
        let salt_len = (salt.len() as u64).to_le_bytes();
        Self(sha256_multi(&[
            BLIND_INDEX_DOMAIN,
            &salt_len,
            salt,
            value.as_bytes(),
        ]))
    }

    /// Wrap an index computed elsewhere (e.g. received from a watchlist feed)
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> crate::Result<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// Bit `i` of the index, most significant bit of byte 0 first
    pub fn bit(&self, i: usize) -> bool {
        (self.0[i / 8] >> (7 - (i % 8))) & 1 == 1
    }

    /// First `count` bits, in [`BlindIndex::bit`] order
    pub fn bits(&self, count: usize) -> Vec<bool> {
        (0..count.min(256)).map(|i| self.bit(i)).collect()
    }
}

impl PartialEq for BlindIndex {
    fn eq(&self, other: &Self) -> bool {
        ct::compare(&self.0, &other.0)
    }
}

impl Eq for BlindIndex {}

impl std::fmt::Debug for BlindIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlindIndex({}..)", hex::encode(&self.0[..4]))
    }
}

/// Watchlist entry: an opaque entry id plus the blind index of the listed name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub entry_id: String,
    pub name_hash: BlindIndex,
}

impl WatchlistEntry {
    pub fn new(entry_id: impl Into<String>, name_hash: BlindIndex) -> Self {
        Self {
            entry_id: entry_id.into(),
            name_hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blind_index_deterministic_per_salt() {
        let a = BlindIndex::create("ACME Shell Holdings", b"client-salt");
        let b = BlindIndex::create("ACME Shell Holdings", b"client-salt");
        let c = BlindIndex::create("ACME Shell Holdings", b"other-salt");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_salt_boundary_is_unambiguous() {
        // Without the length prefix these would hash identically
        let a = BlindIndex::create("bc", b"a");
        let b = BlindIndex::create("c", b"ab");
        assert_ne!(a, b);
    }

    #[test]
    fn test_bits_msb_first() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0b1000_0001;
        let idx = BlindIndex::from_bytes(bytes);
        assert_eq!(
            idx.bits(8),
            vec![true, false, false, false, false, false, false, true]
        );
    }

    #[test]
    fn test_debug_does_not_print_full_hash() {
        let idx = BlindIndex::create("entity", b"salt");
        let rendered = format!("{:?}", idx);
        assert!(!rendered.contains(&idx.to_hex()));
    }

    #[test]
    fn test_serde_roundtrip_hex() {
        let entry = WatchlistEntry::new("ENT-001", BlindIndex::create("entity", b"salt"));
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains(&entry.name_hash.to_hex()));
        let back: WatchlistEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
