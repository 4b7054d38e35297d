//! Error types for the compliance service

use thiserror::Error;

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Errors surfaced to the orchestration layer
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Contract or configuration is missing required security fields
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Core library error
    #[error("Core error: {0}")]
    Core(#[from] veil_core::Error),

    /// Protocol run aborted
    #[error("Protocol error: {0}")]
    Protocol(#[from] veil_gc::ProtocolError),

    /// Ledger or vault failure
    #[error("Ledger error: {0}")]
    Ledger(#[from] veil_ledger::LedgerError),

    /// Firewall setup failure
    #[error("Firewall error: {0}")]
    Firewall(#[from] veil_firewall::FirewallError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::Serialization(e.to_string())
    }
}
