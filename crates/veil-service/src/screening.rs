//! Screening requests and outcomes

use serde::{Deserialize, Serialize};

use veil_core::{BlindIndex, SealedAmount};

/// Fixed statement attached to every screening outcome
pub const PRIVACY_GUARANTEE: &str = "No PII revealed; only boolean flags returned";

/// Reason attached to every batch flag
pub const FLAG_REASON_THRESHOLD: &str = "amount_exceeds_threshold";

/// Transaction as received from the orchestration layer: the amount is sealed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: String,
    pub amount: SealedAmount,
}

/// What to screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScreeningRequest {
    /// Watchlist membership of a blind-indexed entity
    Entity {
        agent_id: String,
        candidate: BlindIndex,
    },
    /// Threshold comparison of a sealed transaction amount
    Transaction {
        agent_id: String,
        record: TransactionRecord,
    },
}

/// The single bit a screening reveals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScreeningResult {
    Membership { match_flag: bool },
    Threshold { exceeds_threshold: bool },
}

impl ScreeningResult {
    pub fn flag(&self) -> bool {
        match *self {
            ScreeningResult::Membership { match_flag } => match_flag,
            ScreeningResult::Threshold { exceeds_threshold } => exceeds_threshold,
        }
    }

    pub(crate) fn action(&self) -> &'static str {
        match self {
            ScreeningResult::Membership { .. } => "screen_entity",
            ScreeningResult::Threshold { .. } => "screen_transaction",
        }
    }
}

/// Result returned to the orchestration layer.
///
/// Serializes as `{"match_flag": .., "protocol_used": .., "privacy_guarantee": ..}`
/// or with `exceeds_threshold` in place of `match_flag`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningOutcome {
    #[serde(flatten)]
    pub result: ScreeningResult,
    pub protocol_used: String,
    pub privacy_guarantee: String,
}

impl ScreeningOutcome {
    pub fn new(result: ScreeningResult, protocol_used: impl Into<String>) -> Self {
        Self {
            result,
            protocol_used: protocol_used.into(),
            privacy_guarantee: PRIVACY_GUARANTEE.to_string(),
        }
    }

    pub fn flag(&self) -> bool {
        self.result.flag()
    }
}

/// A batch entry whose amount exceeded the threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFlag {
    pub transaction_index: usize,
    pub flag_reason: String,
}

impl TransactionFlag {
    pub fn exceeds_threshold(transaction_index: usize) -> Self {
        Self {
            transaction_index,
            flag_reason: FLAG_REASON_THRESHOLD.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_membership_outcome_shape() {
        let outcome = ScreeningOutcome::new(
            ScreeningResult::Membership { match_flag: false },
            "Yao-GC",
        );
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({
                "match_flag": false,
                "protocol_used": "Yao-GC",
                "privacy_guarantee": "No PII revealed; only boolean flags returned"
            })
        );
    }

    #[test]
    fn test_threshold_outcome_round_trip() {
        let outcome = ScreeningOutcome::new(
            ScreeningResult::Threshold {
                exceeds_threshold: true,
            },
            "Yao-GC",
        );
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["exceeds_threshold"], json!(true));
        assert!(value.get("match_flag").is_none());

        let back: ScreeningOutcome = serde_json::from_value(value).unwrap();
        assert_eq!(back, outcome);
        assert!(back.flag());
    }

    #[test]
    fn test_flag_reason() {
        let flag = TransactionFlag::exceeds_threshold(2);
        assert_eq!(
            serde_json::to_value(&flag).unwrap(),
            json!({"transaction_index": 2, "flag_reason": "amount_exceeds_threshold"})
        );
    }
}
