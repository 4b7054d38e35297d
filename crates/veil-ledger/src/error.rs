//! Error types for the ledger and vault

use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors raised by the provenance ledger and artifact vault
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Core library error
    #[error("Core error: {0}")]
    Core(#[from] veil_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A write was not acknowledged after every retry
    #[error("Storage error after {attempts} attempt(s): {message}")]
    Storage { attempts: u32, message: String },

    /// Artifact reference not present in the vault
    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// Stored events do not form a valid hash chain
    #[error("Provenance chain broken at sequence {sequence}: {reason}")]
    ChainBroken { sequence: u64, reason: String },

    /// Backend used after close
    #[error("Storage backend is closed")]
    Closed,
}

impl LedgerError {
    /// Whether retrying the same write may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Io(_) | LedgerError::Storage { .. })
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::Serialization(e.to_string())
    }
}
