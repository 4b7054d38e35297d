#![no_main]

use libfuzzer_sys::fuzz_target;
use veil_service::{SecurityContract, ServiceError};

fuzz_target!(|data: &str| {
    match SecurityContract::from_json(data) {
        Ok(contract) => {
            assert!(!contract.contract_id.trim().is_empty());
            // Firewall rules are only handed out when the policy is enabled
            if let Some(policy) = &contract.firewall_policy {
                assert_eq!(contract.firewall_rules().is_some(), policy.enabled);
            }
        }
        Err(ServiceError::Configuration(_)) => {}
        Err(other) => panic!("unexpected contract error: {}", other),
    }
});
