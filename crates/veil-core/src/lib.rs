//! Veil Core - Constant-time primitives and shared types
//!
//! This crate provides the leaf building blocks for Veil's privacy-preserving
//! compliance screening: branch-free comparison and selection, a fixed-round
//! modular inverse, canonical hashing, blind indexes, and sealed amounts.

pub mod blind_index;
pub mod ct;
pub mod error;
pub mod hash;
pub mod sealed;

pub use blind_index::{BlindIndex, WatchlistEntry};
pub use ct::{compare, compare_traced, mod_inverse, select, CompareTrace};
pub use error::{Error, Result};
pub use hash::{canonical_json, content_hash, sha256, sha256_multi, Digest};
pub use sealed::{AmountKey, SealedAmount};

/// Width in bytes of a wire key
pub const WIRE_KEY_LEN: usize = 16;

/// Number of leading blind-index bits compared inside the membership circuit
pub const IDENT_BITS: usize = 128;

/// Number of bits in a threshold comparison
pub const AMOUNT_BITS: usize = 64;
