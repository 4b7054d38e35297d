//! Veil Firewall - Session-level semantic firewall
//!
//! Inspects a rolling window of multi-agent dialogue for composite-context
//! violations: PII that only appears when messages are read together,
//! incremental querying that could reconstruct protected data, and
//! contract-configured keyword or pattern rules.
//!
//! One [`SessionFirewall`] per session; [`FirewallRegistry`] owns them and
//! applies the [`UninitializedPolicy`] to sessions that have none.

pub mod error;
pub mod policy;
pub mod registry;
pub mod session;

pub use error::{FirewallError, Result};
pub use policy::{CompiledRules, PiiDetector, PolicyRule, REDACTION};
pub use registry::{FirewallRegistry, UninitializedPolicy};
pub use session::{
    DialogueEvent, FirewallAction, FirewallDecision, SessionFirewall, WINDOW_CAPACITY,
};
