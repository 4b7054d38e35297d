#![no_main]

use libfuzzer_sys::fuzz_target;
use veil_firewall::{FirewallAction, PolicyRule, SessionFirewall, WINDOW_CAPACITY};

fuzz_target!(|messages: Vec<String>| {
    let rules = vec![
        PolicyRule::KeywordBlock {
            keywords: vec!["balance".to_string()],
        },
        PolicyRule::PatternBlock {
            patterns: vec![r"ACCT-\d+".to_string()],
        },
    ];
    let Ok(mut firewall) = SessionFirewall::new("fuzz", &rules) else {
        return;
    };

    for message in &messages {
        let decision = firewall.check_message(message, "agent", "fuzz");

        // Window is bounded whatever arrives
        assert!(firewall.window_len() <= WINDOW_CAPACITY);

        match decision.action {
            FirewallAction::Allow => assert!(decision.allowed),
            FirewallAction::Block => {
                assert!(!decision.allowed);
                assert!(decision.sanitized_content.is_none());
            }
        }
    }
});
