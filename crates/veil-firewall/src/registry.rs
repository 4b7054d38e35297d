//! Session firewall registry
//!
//! Maps each active session to its own [`SessionFirewall`]. Messages for a
//! session with no firewall are handled by the [`UninitializedPolicy`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{FirewallError, Result};
use crate::policy::PolicyRule;
use crate::session::{FirewallDecision, SessionFirewall, REASON_NOT_INITIALIZED};

/// Behaviour for sessions without a firewall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UninitializedPolicy {
    /// Allow the message, flagged with a warning reason
    #[default]
    FailOpen,
    /// Block the message
    FailClosed,
}

#[derive(Debug, Default)]
pub struct FirewallRegistry {
    sessions: HashMap<String, SessionFirewall>,
    uninitialized: UninitializedPolicy,
}

impl FirewallRegistry {
    pub fn new(uninitialized: UninitializedPolicy) -> Self {
        Self {
            sessions: HashMap::new(),
            uninitialized,
        }
    }

    /// Start monitoring `session_id` under `rules`
    pub fn open_session(&mut self, session_id: &str, rules: &[PolicyRule]) -> Result<()> {
        if self.sessions.contains_key(session_id) {
            return Err(FirewallError::SessionExists(session_id.to_string()));
        }
        let firewall = SessionFirewall::new(session_id, rules)?;
        self.sessions.insert(session_id.to_string(), firewall);
        info!("Session firewall opened for {}", session_id);
        Ok(())
    }

    /// Stop monitoring; the session's window is dropped. Returns whether a
    /// firewall was registered.
    pub fn close_session(&mut self, session_id: &str) -> bool {
        let closed = self.sessions.remove(session_id).is_some();
        if closed {
            info!("Session firewall closed for {}", session_id);
        }
        closed
    }

    pub fn session(&self, session_id: &str) -> Option<&SessionFirewall> {
        self.sessions.get(session_id)
    }

    pub fn check_message(
        &mut self,
        content: &str,
        agent_id: &str,
        session_id: &str,
    ) -> FirewallDecision {
        match self.sessions.get_mut(session_id) {
            Some(firewall) => firewall.check_message(content, agent_id, session_id),
            None => match self.uninitialized {
                UninitializedPolicy::FailOpen => {
                    warn!(
                        "Session firewall not initialized for {}, allowing message",
                        session_id
                    );
                    FirewallDecision::allow(REASON_NOT_INITIALIZED, None)
                }
                UninitializedPolicy::FailClosed => {
                    warn!(
                        "Session firewall not initialized for {}, blocking message",
                        session_id
                    );
                    FirewallDecision::block(REASON_NOT_INITIALIZED)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FirewallAction;

    #[test]
    fn test_fail_open_default() {
        let mut registry = FirewallRegistry::default();
        let d = registry.check_message("hello", "agent", "unknown");
        assert!(d.allowed);
        assert_eq!(d.reason, "Firewall not initialized");
        assert_eq!(d.action, FirewallAction::Allow);
    }

    #[test]
    fn test_fail_closed() {
        let mut registry = FirewallRegistry::new(UninitializedPolicy::FailClosed);
        let d = registry.check_message("hello", "agent", "unknown");
        assert!(!d.allowed);
        assert_eq!(d.reason, "Firewall not initialized");
    }

    #[test]
    fn test_sessions_are_isolated() {
        let mut registry = FirewallRegistry::default();
        registry.open_session("s1", &[]).unwrap();
        registry.open_session("s2", &[]).unwrap();

        for q in ["a?", "b?", "c?"] {
            registry.check_message(q, "agent", "s1");
        }
        assert!(!registry.check_message("more", "agent", "s1").allowed);
        assert!(registry.check_message("more", "agent", "s2").allowed);
        assert_eq!(registry.session("s2").map(|s| s.window_len()), Some(1));
    }

    #[test]
    fn test_duplicate_open_rejected() {
        let mut registry = FirewallRegistry::default();
        registry.open_session("s1", &[]).unwrap();
        assert!(matches!(
            registry.open_session("s1", &[]),
            Err(FirewallError::SessionExists(_))
        ));
    }

    #[test]
    fn test_close_drops_window() {
        let mut registry = FirewallRegistry::default();
        registry.open_session("s1", &[]).unwrap();
        registry.check_message("ssn 123-45-6789", "agent", "s1");
        assert!(registry.close_session("s1"));
        assert!(!registry.close_session("s1"));

        registry.open_session("s1", &[]).unwrap();
        assert!(registry.check_message("clean", "agent", "s1").allowed);
    }

    #[test]
    fn test_policy_serde() {
        let p: UninitializedPolicy = serde_json::from_str("\"fail_closed\"").unwrap();
        assert_eq!(p, UninitializedPolicy::FailClosed);
    }
}
