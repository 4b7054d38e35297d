//! Security contract
//!
//! The orchestration layer hands the service a signed contract describing
//! the required security posture. Signature checking happens upstream; this
//! module only enforces that the posture fields are present.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use veil_firewall::PolicyRule;

use crate::error::{Result, ServiceError};

/// Fields that must be present under `security_protocols`
const REQUIRED_PROTOCOL_FLAGS: [&str; 4] = [
    "mpc_required",
    "session_firewall_enabled",
    "blind_indexing_required",
    "oram_enabled",
];

/// Required security posture flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityProtocols {
    pub mpc_required: bool,
    pub session_firewall_enabled: bool,
    pub blind_indexing_required: bool,
    pub oram_enabled: bool,
}

/// Firewall section of a contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallPolicy {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityContract {
    pub contract_id: String,
    pub security_protocols: SecurityProtocols,
    #[serde(default)]
    pub firewall_policy: Option<FirewallPolicy>,
}

impl SecurityContract {
    /// Parse a contract, rejecting it if any required security field is missing
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| ServiceError::Configuration(format!("contract is not valid JSON: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let missing = missing_fields(&value);
        if !missing.is_empty() {
            return Err(ServiceError::Configuration(format!(
                "contract missing required security fields: {}",
                missing.join(", ")
            )));
        }

        let contract: Self = serde_json::from_value(value)
            .map_err(|e| ServiceError::Configuration(format!("malformed contract: {}", e)))?;

        if contract.contract_id.trim().is_empty() {
            return Err(ServiceError::Configuration(
                "contract_id must not be empty".to_string(),
            ));
        }

        contract.warn_on_weak_posture();
        Ok(contract)
    }

    /// Rules for new sessions, if the contract enables the firewall
    pub fn firewall_rules(&self) -> Option<&[PolicyRule]> {
        self.firewall_policy
            .as_ref()
            .filter(|p| p.enabled)
            .map(|p| p.rules.as_slice())
    }

    fn warn_on_weak_posture(&self) {
        let flags = &self.security_protocols;
        if !flags.mpc_required {
            warn!(
                "Contract {} does not require MPC; screening still runs under the garbled-circuit protocol",
                self.contract_id
            );
        }
        if flags.session_firewall_enabled && self.firewall_rules().is_none() {
            warn!(
                "Contract {} requires a session firewall but defines no enabled firewall policy",
                self.contract_id
            );
        }
        if !flags.session_firewall_enabled {
            warn!(
                "Contract {} does not require a session firewall; cross-session reconstruction risk elevated",
                self.contract_id
            );
        }
    }
}

fn missing_fields(value: &Value) -> Vec<String> {
    let mut missing = Vec::new();

    match value.get("contract_id") {
        Some(Value::String(_)) => {}
        _ => missing.push("contract_id".to_string()),
    }

    match value.get("security_protocols") {
        Some(Value::Object(protocols)) => {
            for flag in REQUIRED_PROTOCOL_FLAGS {
                if !matches!(protocols.get(flag), Some(Value::Bool(_))) {
                    missing.push(format!("security_protocols.{}", flag));
                }
            }
        }
        _ => missing.push("security_protocols".to_string()),
    }

    missing
}
