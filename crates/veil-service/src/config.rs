//! Service configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use veil_firewall::UninitializedPolicy;
use veil_ledger::RetryPolicy;

use crate::error::{Result, ServiceError};

/// Stable location of the provenance audit export
pub const DEFAULT_EXPORT_PATH: &str = "factory_logs/provenance_audit.jsonl";

/// Service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// JSONL file backing the provenance ledger
    pub ledger_path: PathBuf,

    /// Directory backing the artifact vault
    pub vault_path: PathBuf,

    /// Target of `export-provenance` when no path is given
    pub provenance_export_path: PathBuf,

    /// Bound on a single protocol run (milliseconds)
    pub screening_timeout_ms: u64,

    /// Attempts per ledger or vault write before it is surfaced
    pub storage_retry_attempts: u32,

    /// Disclosure threshold in minor currency units
    pub threshold: u64,

    /// Behaviour for messages in sessions without a firewall
    pub uninitialized_firewall: UninitializedPolicy,

    /// Salt for deriving blind indexes; must match the watchlist provider's
    pub blind_index_salt: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let data_dir = Self::default_data_dir();
        Self {
            ledger_path: data_dir.join("ledger.jsonl"),
            vault_path: data_dir.join("vault"),
            provenance_export_path: PathBuf::from(DEFAULT_EXPORT_PATH),
            screening_timeout_ms: 30_000,
            storage_retry_attempts: 3,
            threshold: 10_000,
            uninitialized_firewall: UninitializedPolicy::FailOpen,
            blind_index_salt: String::new(),
        }
    }
}

impl ServiceConfig {
    fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("/var/lib"))
            .join("veil")
    }

    /// All storage under `base`; used by tests and one-shot runs
    pub fn with_base_dir(base: &Path) -> Self {
        Self {
            ledger_path: base.join("ledger.jsonl"),
            vault_path: base.join("vault"),
            provenance_export_path: base.join(DEFAULT_EXPORT_PATH),
            ..Self::default()
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create directories if they don't exist
    pub fn ensure_directories(&self) -> Result<()> {
        if let Some(parent) = self.ledger_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::create_dir_all(&self.vault_path)?;
        Ok(())
    }

    /// Reject settings no screening can run under
    pub fn validate(&self) -> Result<()> {
        if self.screening_timeout_ms == 0 {
            return Err(ServiceError::Configuration(
                "screening_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.blind_index_salt.is_empty() {
            return Err(ServiceError::Configuration(
                "blind_index_salt must be set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn screening_timeout(&self) -> Duration {
        Duration::from_millis(self.screening_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.storage_retry_attempts)
    }
}
