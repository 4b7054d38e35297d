//! Error types for the garbled-circuit protocol

use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Reasons a protocol run aborts. No variant carries partial results.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Garbled material is malformed or does not match its commitment
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// The oblivious-transfer subprotocol failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// The run exceeded its deadline
    #[error("Protocol timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u128 },

    /// Circuit construction or input shape error
    #[error("Invalid circuit: {0}")]
    InvalidCircuit(String),

    /// Core library error
    #[error("Core error: {0}")]
    Core(#[from] veil_core::Error),
}

impl ProtocolError {
    /// Short, content-free label used when recording an abort
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolError::Integrity(_) => "integrity",
            ProtocolError::Connection(_) => "connection",
            ProtocolError::Timeout { .. } => "timeout",
            ProtocolError::InvalidCircuit(_) => "invalid_circuit",
            ProtocolError::Core(_) => "core",
        }
    }
}
