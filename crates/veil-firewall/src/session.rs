//! Per-session sliding-window firewall
//!
//! Each inbound message joins a window of the last [`WINDOW_CAPACITY`]
//! messages. Policy is evaluated over the composite of the whole window, so
//! a secret split across several harmless-looking messages is still caught.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::policy::{CompiledRules, PiiDetector, PolicyRule};

/// Maximum number of dialogue events kept per session
pub const WINDOW_CAPACITY: usize = 10;

/// Interrogative events in the window that trigger the reconstruction check
pub const INCREMENTAL_QUERY_THRESHOLD: usize = 3;

pub const REASON_PASSED: &str = "Message passed firewall checks";
pub const REASON_PII: &str = "PII pattern detected in composite context";
pub const REASON_INCREMENTAL: &str = "Potential incremental query pattern (reconstruction risk)";
pub const REASON_SESSION_MISMATCH: &str = "Session mismatch";
pub const REASON_NOT_INITIALIZED: &str = "Firewall not initialized";

/// What the caller should do with the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FirewallAction {
    Allow,
    Block,
}

/// Outcome of a firewall check. A block is a normal return value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallDecision {
    pub allowed: bool,
    pub reason: String,
    /// Redacted message when redaction changed it, otherwise `None`
    pub sanitized_content: Option<String>,
    pub action: FirewallAction,
}

impl FirewallDecision {
    pub fn allow(reason: impl Into<String>, sanitized_content: Option<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
            sanitized_content,
            action: FirewallAction::Allow,
        }
    }

    pub fn block(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
            sanitized_content: None,
            action: FirewallAction::Block,
        }
    }
}

/// One inbound message, kept only while inside the window
#[derive(Clone)]
pub struct DialogueEvent {
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub session_id: String,
    pub content: String,
}

impl std::fmt::Debug for DialogueEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogueEvent")
            .field("timestamp", &self.timestamp)
            .field("agent_id", &self.agent_id)
            .field("session_id", &self.session_id)
            .field("content", &format_args!("[{} bytes]", self.content.len()))
            .finish()
    }
}

/// Firewall owned by exactly one session
#[derive(Debug)]
pub struct SessionFirewall {
    session_id: String,
    rules: CompiledRules,
    pii: PiiDetector,
    window: VecDeque<DialogueEvent>,
}

impl SessionFirewall {
    /// Compile `rules` for `session_id`. Rules are fixed for the session.
    pub fn new(session_id: impl Into<String>, rules: &[PolicyRule]) -> Result<Self> {
        Ok(Self {
            session_id: session_id.into(),
            rules: CompiledRules::compile(rules)?,
            pii: PiiDetector::new()?,
            window: VecDeque::with_capacity(WINDOW_CAPACITY + 1),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Events currently in the window, oldest first
    pub fn window(&self) -> impl Iterator<Item = &DialogueEvent> {
        self.window.iter()
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Record `content` and evaluate policy over the updated window.
    ///
    /// A message for another session is blocked without entering the window.
    pub fn check_message(
        &mut self,
        content: &str,
        agent_id: &str,
        session_id: &str,
    ) -> FirewallDecision {
        if session_id != self.session_id {
            debug!(
                "Firewall for session {} rejected message tagged {}",
                self.session_id, session_id
            );
            return FirewallDecision::block(REASON_SESSION_MISMATCH);
        }

        self.window.push_back(DialogueEvent {
            timestamp: Utc::now(),
            agent_id: agent_id.to_string(),
            session_id: session_id.to_string(),
            content: content.to_string(),
        });
        while self.window.len() > WINDOW_CAPACITY {
            self.window.pop_front();
        }

        let composite = self
            .window
            .iter()
            .map(|e| e.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let mut violations = Vec::new();
        if self.pii.detect(&composite) {
            violations.push(REASON_PII.to_string());
        }

        let queries = self.window.iter().filter(|e| e.content.contains('?')).count();
        if queries >= INCREMENTAL_QUERY_THRESHOLD {
            violations.push(REASON_INCREMENTAL.to_string());
        }

        violations.extend(self.rules.violations(&composite));

        if !violations.is_empty() {
            debug!(
                "Session {} blocked message from {} ({} violation(s))",
                self.session_id,
                agent_id,
                violations.len()
            );
            return FirewallDecision::block(violations.join("; "));
        }

        let redacted = self.pii.redact(content);
        let sanitized = (redacted != content).then_some(redacted);
        FirewallDecision::allow(REASON_PASSED, sanitized)
    }
}
