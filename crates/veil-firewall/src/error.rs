//! Error types for the session firewall
//!
//! A blocked message is not an error: it is a [`FirewallDecision`] with
//! `allowed == false`.
//!
//! [`FirewallDecision`]: crate::FirewallDecision

use thiserror::Error;

/// Result type alias for firewall operations
pub type Result<T> = std::result::Result<T, FirewallError>;

#[derive(Debug, Error)]
pub enum FirewallError {
    /// A `pattern_block` rule failed to compile
    #[error("Invalid policy pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// A firewall is already registered for the session
    #[error("Session firewall already exists: {0}")]
    SessionExists(String),
}
