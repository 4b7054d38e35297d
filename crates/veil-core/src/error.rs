//! Error types for veil-core

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the core primitives
#[derive(Debug, Error)]
pub enum Error {
    /// gcd(a, modulus) != 1
    #[error("No modular inverse exists")]
    NoInverse,

    /// Modulus must be greater than one
    #[error("Invalid modulus: {0}")]
    InvalidModulus(u64),

    /// Cipher or key material failure
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Malformed hex input
    #[error("Invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
