//! Compliance service facade
//!
//! The single entry point the orchestration layer calls. It owns the shared
//! ledger and vault, the screening engine and the per-session firewalls, and
//! records every privacy-sensitive operation in the provenance ledger using
//! hashes only.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use veil_core::{content_hash, sha256_multi, AmountKey, BlindIndex};
use veil_firewall::{FirewallDecision, FirewallRegistry};
use veil_gc::{ScreeningEngine, YaoProtocol};
use veil_ledger::{
    ArtifactVault, DirArtifactStore, EventBody, JsonlLedgerStore, MemoryArtifactStore,
    MemoryLedgerStore, ProvenanceId, ProvenanceLedger, RefTag,
};

use crate::config::ServiceConfig;
use crate::contract::SecurityContract;
use crate::error::{Result, ServiceError};
use crate::screening::{
    ScreeningOutcome, ScreeningRequest, ScreeningResult, TransactionFlag, TransactionRecord,
};
use crate::watchlist::WatchlistSource;

const SCREEN_DOMAINS: (&[u8], &[u8]) =
    (b"veil/screen-input/v1", b"veil/screen-output/v1");
const FIREWALL_DOMAINS: (&[u8], &[u8]) =
    (b"veil/firewall-input/v1", b"veil/firewall-output/v1");

/// Ledger action for a screening run that did not complete
pub const ACTION_SCREEN_ABORTED: &str = "screen_aborted";

/// Ledger action for a firewall decision
pub const ACTION_FIREWALL_CHECK: &str = "firewall_check";

/// Shared resources a service is assembled from
pub struct ServiceBackends {
    pub ledger: Arc<ProvenanceLedger>,
    pub vault: ArtifactVault,
    pub engine: Box<dyn ScreeningEngine>,
}

/// Fresh key for the hashes one ledger event records, so equal inputs
/// never produce equal or guessable hashes
struct AuditScope {
    id: Uuid,
    domains: (&'static [u8], &'static [u8]),
}

impl AuditScope {
    fn screening() -> Self {
        Self {
            id: Uuid::new_v4(),
            domains: SCREEN_DOMAINS,
        }
    }

    fn firewall_check() -> Self {
        Self {
            id: Uuid::new_v4(),
            domains: FIREWALL_DOMAINS,
        }
    }

    fn input_hash(&self, data: &[u8]) -> String {
        hex::encode(sha256_multi(&[self.domains.0, &self.id.as_bytes()[..], data]))
    }

    fn output_hash(&self, data: &[u8]) -> String {
        hex::encode(sha256_multi(&[self.domains.1, &self.id.as_bytes()[..], data]))
    }
}

pub struct ComplianceService {
    contract: SecurityContract,
    config: ServiceConfig,
    ledger: Arc<ProvenanceLedger>,
    vault: ArtifactVault,
    engine: Box<dyn ScreeningEngine>,
    watchlist: Box<dyn WatchlistSource>,
    amount_key: AmountKey,
    firewalls: Mutex<FirewallRegistry>,
}

impl ComplianceService {
    /// Service over the durable backends named in `config`
    pub fn open(
        contract: SecurityContract,
        config: ServiceConfig,
        watchlist: Box<dyn WatchlistSource>,
        amount_key: AmountKey,
    ) -> Result<Self> {
        config.validate()?;
        config.ensure_directories()?;

        let ledger = Arc::new(ProvenanceLedger::open(
            Box::new(JsonlLedgerStore::new(&config.ledger_path)),
            config.retry_policy(),
        )?);
        let vault = ArtifactVault::open(
            Box::new(DirArtifactStore::new(&config.vault_path)),
            config.retry_policy(),
        )?
        .with_ledger(Arc::clone(&ledger));
        let engine = Box::new(YaoProtocol::ideal(config.screening_timeout()));

        Self::with_backends(
            contract,
            config,
            ServiceBackends {
                ledger,
                vault,
                engine,
            },
            watchlist,
            amount_key,
        )
    }

    /// Service over in-memory backends
    pub fn in_memory(
        contract: SecurityContract,
        config: ServiceConfig,
        watchlist: Box<dyn WatchlistSource>,
        amount_key: AmountKey,
    ) -> Result<Self> {
        let ledger = Arc::new(ProvenanceLedger::open(
            Box::new(MemoryLedgerStore::new()),
            config.retry_policy(),
        )?);
        let vault = ArtifactVault::open(
            Box::new(MemoryArtifactStore::new()),
            config.retry_policy(),
        )?
        .with_ledger(Arc::clone(&ledger));
        let engine = Box::new(YaoProtocol::ideal(config.screening_timeout()));

        Self::with_backends(
            contract,
            config,
            ServiceBackends {
                ledger,
                vault,
                engine,
            },
            watchlist,
            amount_key,
        )
    }

    pub fn with_backends(
        contract: SecurityContract,
        config: ServiceConfig,
        backends: ServiceBackends,
        watchlist: Box<dyn WatchlistSource>,
        amount_key: AmountKey,
    ) -> Result<Self> {
        config.validate()?;

        info!(
            "Compliance service ready for contract {} using {}",
            contract.contract_id,
            backends.engine.protocol_name()
        );

        Ok(Self {
            firewalls: Mutex::new(FirewallRegistry::new(config.uninitialized_firewall)),
            contract,
            config,
            ledger: backends.ledger,
            vault: backends.vault,
            engine: backends.engine,
            watchlist,
            amount_key,
        })
    }

    pub fn contract(&self) -> &SecurityContract {
        &self.contract
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<ProvenanceLedger> {
        &self.ledger
    }

    /// Blind index of `value` under the configured salt
    pub fn blind_index(&self, value: &str) -> BlindIndex {
        BlindIndex::create(value, self.config.blind_index_salt.as_bytes())
    }

    // -- Screening --

    pub fn screen(&self, request: &ScreeningRequest) -> Result<ScreeningOutcome> {
        match request {
            ScreeningRequest::Entity {
                agent_id,
                candidate,
            } => self.screen_entity(agent_id, candidate),
            ScreeningRequest::Transaction { agent_id, record } => {
                self.screen_transaction(agent_id, record)
            }
        }
    }

    /// Whether `candidate` is on the current watchlist
    pub fn screen_entity(
        &self,
        agent_id: &str,
        candidate: &BlindIndex,
    ) -> Result<ScreeningOutcome> {
        let watchlist = self.watchlist.fetch()?;
        let run = AuditScope::screening();
        let input_hash = run.input_hash(candidate.as_bytes());

        debug!(
            "Screening run {} for {} against {} watchlist entries",
            run.id,
            agent_id,
            watchlist.len()
        );

        match self.engine.check_membership(candidate, &watchlist) {
            Ok(match_flag) => self.complete(
                &run,
                agent_id,
                input_hash,
                ScreeningResult::Membership { match_flag },
            ),
            Err(e) => Err(self.abort(&run, agent_id, input_hash, e.kind(), e.into())),
        }
    }

    /// Whether the sealed amount of `record` exceeds the configured threshold
    pub fn screen_transaction(
        &self,
        agent_id: &str,
        record: &TransactionRecord,
    ) -> Result<ScreeningOutcome> {
        let run = AuditScope::screening();
        let input_hash = run.input_hash(content_hash(record)?.as_bytes());

        let amount = match record.amount.open(&self.amount_key) {
            Ok(amount) => amount,
            Err(e) => {
                return Err(self.abort(&run, agent_id, input_hash, "sealed_amount", e.into()))
            }
        };

        debug!(
            "Screening run {} for {} on transaction {}",
            run.id, agent_id, record.transaction_id
        );

        match self.engine.exceeds_threshold(*amount, self.config.threshold) {
            Ok(exceeds_threshold) => self.complete(
                &run,
                agent_id,
                input_hash,
                ScreeningResult::Threshold { exceeds_threshold },
            ),
            Err(e) => Err(self.abort(&run, agent_id, input_hash, e.kind(), e.into())),
        }
    }

    /// Flags for every record above the threshold, one protocol run each
    pub fn flag_transactions(
        &self,
        agent_id: &str,
        records: &[TransactionRecord],
    ) -> Result<Vec<TransactionFlag>> {
        let mut flags = Vec::new();
        for (index, record) in records.iter().enumerate() {
            if self.screen_transaction(agent_id, record)?.flag() {
                flags.push(TransactionFlag::exceeds_threshold(index));
            }
        }
        info!(
            "Flagged {} of {} transactions for {}",
            flags.len(),
            records.len(),
            agent_id
        );
        Ok(flags)
    }

    fn complete(
        &self,
        run: &AuditScope,
        agent_id: &str,
        input_hash: String,
        result: ScreeningResult,
    ) -> Result<ScreeningOutcome> {
        let protocol = self.engine.protocol_name();
        let output_hash = run.output_hash(&[u8::from(result.flag())]);
        let provenance_id = self.ledger.append(
            EventBody::new(agent_id, result.action(), input_hash, output_hash)
                .with_protocol(protocol),
        )?;

        info!(
            "Screening run {} for {} recorded as {}",
            run.id, agent_id, provenance_id
        );
        Ok(ScreeningOutcome::new(result, protocol))
    }

    /// Record an aborted run and hand back the error to surface
    fn abort(
        &self,
        run: &AuditScope,
        agent_id: &str,
        input_hash: String,
        kind: &str,
        error: ServiceError,
    ) -> ServiceError {
        warn!("Screening run {} aborted: {}", run.id, kind);

        let body = EventBody::new(
            agent_id,
            ACTION_SCREEN_ABORTED,
            input_hash,
            run.output_hash(kind.as_bytes()),
        )
        .with_protocol(self.engine.protocol_name());

        match self.ledger.append(body) {
            Ok(_) => error,
            Err(ledger_error) => ledger_error.into(),
        }
    }

    // -- Session firewall --

    /// Install a firewall for `session_id` with the contract's rules.
    ///
    /// Returns `false` without installing anything when the contract does
    /// not enable session firewalls; such sessions fall under the
    /// configured uninitialized policy.
    pub fn open_session(&self, session_id: &str) -> Result<bool> {
        if !self.contract.security_protocols.session_firewall_enabled {
            return Ok(false);
        }
        let rules = self.contract.firewall_rules().unwrap_or_default();
        self.firewalls().open_session(session_id, rules)?;
        Ok(true)
    }

    pub fn close_session(&self, session_id: &str) -> bool {
        self.firewalls().close_session(session_id)
    }

    /// Firewall decision for one message. A block is a normal return.
    pub fn check_message(
        &self,
        content: &str,
        agent_id: &str,
        session_id: &str,
    ) -> Result<FirewallDecision> {
        let decision = self
            .firewalls()
            .check_message(content, agent_id, session_id);

        let scope = AuditScope::firewall_check();
        self.ledger.append(EventBody::new(
            agent_id,
            ACTION_FIREWALL_CHECK,
            scope.input_hash(content.as_bytes()),
            scope.output_hash(content_hash(&decision)?.as_bytes()),
        ))?;

        if !decision.allowed {
            info!("Message from {} blocked in session {}", agent_id, session_id);
        }
        Ok(decision)
    }

    fn firewalls(&self) -> MutexGuard<'_, FirewallRegistry> {
        self.firewalls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -- Artifacts and audit --

    pub fn commit_artifact<T: Serialize + ?Sized>(
        &self,
        agent_id: &str,
        content: &T,
        artifact_type: &str,
    ) -> Result<RefTag> {
        Ok(self.vault.commit(agent_id, content, artifact_type)?)
    }

    pub fn retrieve_artifact(&self, ref_tag: &RefTag) -> Result<Value> {
        Ok(self.vault.retrieve(ref_tag)?)
    }

    /// Write the audit trail as JSONL, to the configured path unless `path`
    /// is given. Returns the target and the number of events written.
    pub fn export_provenance(&self, path: Option<&Path>) -> Result<(PathBuf, usize)> {
        let target = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.provenance_export_path.clone());
        let count = self.ledger.export(&target)?;
        info!("Exported {} provenance events to {:?}", count, target);
        Ok((target, count))
    }

    /// Re-derive the ledger chain; returns the number of events checked
    pub fn verify_ledger(&self) -> Result<usize> {
        self.ledger.verify()?;
        Ok(self.ledger.len()?)
    }

    /// Last appended event id, if any
    pub fn last_provenance_id(&self) -> Result<Option<ProvenanceId>> {
        Ok(self
            .ledger
            .events()?
            .last()
            .map(|event| event.provenance_id.clone()))
    }

    pub fn close(&self) -> Result<()> {
        self.vault.close()?;
        self.ledger.close()?;
        info!("Compliance service closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watchlist::StaticWatchlist;
    use serde_json::json;
    use veil_core::{SealedAmount, WatchlistEntry};
    use veil_gc::ProtocolError;

    const SALT: &str = "test-salt";

    fn contract() -> SecurityContract {
        SecurityContract::from_value(json!({
            "contract_id": "CTR-1",
            "security_protocols": {
                "mpc_required": true,
                "session_firewall_enabled": true,
                "blind_indexing_required": true,
                "oram_enabled": false
            },
            "firewall_policy": {
                "enabled": true,
                "rules": [{"type": "keyword_block", "keywords": ["password"]}]
            }
        }))
        .unwrap()
    }

    fn config() -> ServiceConfig {
        ServiceConfig {
            blind_index_salt: SALT.to_string(),
            ..ServiceConfig::default()
        }
    }

    fn key() -> AmountKey {
        AmountKey::from_bytes([9u8; 32])
    }

    fn service() -> ComplianceService {
        let watchlist = StaticWatchlist::new(vec![
            WatchlistEntry::new("W-1", BlindIndex::create("Blocked Trading LLC", SALT.as_bytes())),
            WatchlistEntry::new("W-2", BlindIndex::create("Embargoed Shipping", SALT.as_bytes())),
        ]);
        ComplianceService::in_memory(contract(), config(), Box::new(watchlist), key()).unwrap()
    }

    struct AbortingEngine;

    impl ScreeningEngine for AbortingEngine {
        fn protocol_name(&self) -> &'static str {
            "Yao-GC"
        }

        fn check_membership(
            &self,
            _candidate: &BlindIndex,
            _watchlist: &[WatchlistEntry],
        ) -> veil_gc::Result<bool> {
            Err(ProtocolError::Integrity("row mismatch".to_string()))
        }

        fn exceeds_threshold(&self, _amount: u64, _threshold: u64) -> veil_gc::Result<bool> {
            Err(ProtocolError::Timeout { elapsed_ms: 5 })
        }
    }

    #[test]
    fn test_screen_entity_match_and_miss() {
        let service = service();

        let hit = service
            .screen_entity("agent-1", &service.blind_index("Blocked Trading LLC"))
            .unwrap();
        assert!(hit.flag());
        assert_eq!(hit.protocol_used, "Yao-GC");

        let miss = service
            .screen_entity("agent-1", &service.blind_index("Acme Corp"))
            .unwrap();
        assert!(!miss.flag());

        let events = service.ledger().events().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.body.action == "screen_entity"));
        assert!(events
            .iter()
            .all(|e| e.body.protocol_used.as_deref() == Some("Yao-GC")));
    }

    #[test]
    fn test_screen_transaction_threshold() {
        let service = service();
        let over = TransactionRecord {
            transaction_id: "tx-1".to_string(),
            amount: SealedAmount::seal(&key(), 15_000).unwrap(),
        };
        let at = TransactionRecord {
            transaction_id: "tx-2".to_string(),
            amount: SealedAmount::seal(&key(), 10_000).unwrap(),
        };

        let outcome = service
            .screen(&ScreeningRequest::Transaction {
                agent_id: "agent-1".to_string(),
                record: over.clone(),
            })
            .unwrap();
        assert!(outcome.flag());
        assert!(!service.screen_transaction("agent-1", &at).unwrap().flag());

        let flags = service.flag_transactions("agent-1", &[at, over]).unwrap();
        assert_eq!(flags, vec![TransactionFlag::exceeds_threshold(1)]);
    }

    #[test]
    fn test_wrong_amount_key_aborts() {
        let service = service();
        let record = TransactionRecord {
            transaction_id: "tx-1".to_string(),
            amount: SealedAmount::seal(&AmountKey::from_bytes([1u8; 32]), 50).unwrap(),
        };

        assert!(matches!(
            service.screen_transaction("agent-1", &record),
            Err(ServiceError::Core(_))
        ));
        let events = service.ledger().events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].body.action, ACTION_SCREEN_ABORTED);
    }

    #[test]
    fn test_protocol_abort_recorded() {
        let ledger = Arc::new(ProvenanceLedger::in_memory().unwrap());
        let service = ComplianceService::with_backends(
            contract(),
            config(),
            ServiceBackends {
                ledger: Arc::clone(&ledger),
                vault: ArtifactVault::in_memory().unwrap(),
                engine: Box::new(AbortingEngine),
            },
            Box::new(StaticWatchlist::default()),
            key(),
        )
        .unwrap();

        let err = service
            .screen_entity("agent-1", &service.blind_index("Acme"))
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Protocol(ProtocolError::Integrity(_))
        ));

        let record = TransactionRecord {
            transaction_id: "tx".to_string(),
            amount: SealedAmount::seal(&key(), 1).unwrap(),
        };
        assert!(matches!(
            service.screen_transaction("agent-1", &record),
            Err(ServiceError::Protocol(ProtocolError::Timeout { .. }))
        ));

        let events = ledger.events().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.body.action == ACTION_SCREEN_ABORTED));
    }

    #[test]
    fn test_session_firewall_flow() {
        let service = service();
        assert!(service.open_session("s-1").unwrap());
        assert!(service.open_session("s-1").is_err());

        let ok = service.check_message("hello team", "agent-1", "s-1").unwrap();
        assert!(ok.allowed);

        let blocked = service
            .check_message("what is the password", "agent-1", "s-1")
            .unwrap();
        assert!(!blocked.allowed);
        assert!(blocked.reason.contains("password"));

        assert!(service.close_session("s-1"));
        let unmonitored = service.check_message("hello", "agent-1", "s-1").unwrap();
        assert!(unmonitored.allowed);
        assert_eq!(unmonitored.reason, "Firewall not initialized");

        let events = service.ledger().events().unwrap();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.body.action == ACTION_FIREWALL_CHECK));
        assert!(events
            .iter()
            .all(|e| !e.body.input_hash.contains("password")));
    }

    #[test]
    fn test_firewall_hashes_are_keyed_per_event() {
        let service = service();
        service.open_session("s-1").unwrap();
        service.check_message("yes", "agent-1", "s-1").unwrap();
        service.check_message("yes", "agent-1", "s-1").unwrap();

        let events = service.ledger().events().unwrap();
        assert_eq!(events.len(), 2);
        let unkeyed = hex::encode(veil_core::sha256(b"yes"));
        assert!(events.iter().all(|e| e.body.input_hash != unkeyed));
        assert_ne!(events[0].body.input_hash, events[1].body.input_hash);
        assert_ne!(events[0].body.output_hash, events[1].body.output_hash);
    }

    #[test]
    fn test_firewall_disabled_by_contract() {
        let mut contract = contract();
        contract.security_protocols.session_firewall_enabled = false;
        let service = ComplianceService::in_memory(
            contract,
            config(),
            Box::new(StaticWatchlist::default()),
            key(),
        )
        .unwrap();
        assert!(!service.open_session("s-1").unwrap());
    }

    #[test]
    fn test_artifact_round_trip_and_export() {
        let temp = tempfile::TempDir::new().unwrap();
        let service = service();
        let content = json!({"report": "weekly", "flags": [1, 2]});

        let tag = service.commit_artifact("agent-1", &content, "report").unwrap();
        assert_eq!(service.retrieve_artifact(&tag).unwrap(), content);

        let target = temp.path().join("audit.jsonl");
        let (path, count) = service.export_provenance(Some(&target)).unwrap();
        assert_eq!(path, target);
        assert_eq!(count, 1);
        assert_eq!(service.verify_ledger().unwrap(), 1);
        assert!(service.last_provenance_id().unwrap().is_some());
    }

    #[test]
    fn test_config_validated() {
        let result = ComplianceService::in_memory(
            contract(),
            ServiceConfig::default(),
            Box::new(StaticWatchlist::default()),
            key(),
        );
        assert!(matches!(result, Err(ServiceError::Configuration(_))));
    }

    #[test]
    fn test_close_rejects_further_writes() {
        let service = service();
        service.close().unwrap();
        assert!(matches!(
            service.commit_artifact("agent-1", &json!(1), "n"),
            Err(ServiceError::Ledger(_))
        ));
    }
}
