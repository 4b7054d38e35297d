//! Veil Service - Compliance screening facade
//!
//! Validates the security contract, then exposes the operations the
//! orchestration layer consumes:
//!
//! - [`ComplianceService::screen`]: watchlist membership or threshold
//!   disclosure through the garbled-circuit protocol
//! - [`ComplianceService::check_message`]: session firewall decision
//! - [`ComplianceService::commit_artifact`] / [`ComplianceService::retrieve_artifact`]
//! - [`ComplianceService::export_provenance`]: JSONL audit trail

pub mod config;
pub mod contract;
pub mod error;
pub mod screening;
pub mod service;
pub mod watchlist;

pub use config::{ServiceConfig, DEFAULT_EXPORT_PATH};
pub use contract::{FirewallPolicy, SecurityContract, SecurityProtocols};
pub use error::{Result, ServiceError};
pub use screening::{
    ScreeningOutcome, ScreeningRequest, ScreeningResult, TransactionFlag, TransactionRecord,
    FLAG_REASON_THRESHOLD, PRIVACY_GUARANTEE,
};
pub use service::{
    ComplianceService, ServiceBackends, ACTION_FIREWALL_CHECK, ACTION_SCREEN_ABORTED,
};
pub use watchlist::{FileWatchlist, StaticWatchlist, WatchlistSource};
