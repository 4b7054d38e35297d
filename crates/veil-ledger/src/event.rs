//! Provenance events
//!
//! An event's id is the first 16 hex characters of the SHA-256 of the
//! canonical JSON of its body, sequence number and predecessor id. Chaining
//! the predecessor makes any edit, removal or reordering of stored events
//! detectable on reload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use veil_core::content_hash;

use crate::error::Result;

/// Hex characters kept from the content hash
pub const PROVENANCE_ID_LEN: usize = 16;

/// Truncated content hash identifying one event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvenanceId(String);

impl ProvenanceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProvenanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What happened, by whom, over which (hashed) data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBody {
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub input_hash: String,
    pub output_hash: String,
    pub protocol_used: Option<String>,
}

impl EventBody {
    /// Body stamped with the current time
    pub fn new(
        agent_id: impl Into<String>,
        action: impl Into<String>,
        input_hash: impl Into<String>,
        output_hash: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            timestamp: Utc::now(),
            action: action.into(),
            input_hash: input_hash.into(),
            output_hash: output_hash.into(),
            protocol_used: None,
        }
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol_used = Some(protocol.into());
        self
    }
}

/// An appended, immutable ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceEvent {
    pub provenance_id: ProvenanceId,
    pub sequence: u64,
    pub prev_id: Option<ProvenanceId>,
    #[serde(flatten)]
    pub body: EventBody,
}

#[derive(Serialize)]
struct IdPreimage<'a> {
    body: &'a EventBody,
    sequence: u64,
    prev_id: Option<&'a ProvenanceId>,
}

impl ProvenanceEvent {
    /// Assign an id to `body` at position `sequence` after `prev_id`
    pub fn seal(body: EventBody, sequence: u64, prev_id: Option<ProvenanceId>) -> Result<Self> {
        let provenance_id = derive_id(&body, sequence, prev_id.as_ref())?;
        Ok(Self {
            provenance_id,
            sequence,
            prev_id,
            body,
        })
    }

    /// Whether the stored id matches the event's contents
    pub fn id_is_valid(&self) -> Result<bool> {
        let expected = derive_id(&self.body, self.sequence, self.prev_id.as_ref())?;
        Ok(veil_core::compare(
            expected.as_str().as_bytes(),
            self.provenance_id.as_str().as_bytes(),
        ))
    }
}

fn derive_id(
    body: &EventBody,
    sequence: u64,
    prev_id: Option<&ProvenanceId>,
) -> Result<ProvenanceId> {
    let digest = content_hash(&IdPreimage {
        body,
        sequence,
        prev_id,
    })?;
    Ok(ProvenanceId(digest.truncated_hex(PROVENANCE_ID_LEN)))
}
