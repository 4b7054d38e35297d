//! Storage failure and durability tests for veil-ledger

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use veil_ledger::{
    ArtifactRecord, ArtifactStore, ArtifactVault, EventBody, JsonlLedgerStore, LedgerError,
    LedgerStore, MemoryArtifactStore, MemoryLedgerStore, ProvenanceEvent, ProvenanceLedger,
    RefTag, RetryPolicy,
};

// ============================================
// Flaky backends
// ============================================

/// Ledger backend that fails the first `failures` appends
struct FlakyLedgerStore {
    inner: MemoryLedgerStore,
    failures: Arc<AtomicU32>,
}

impl LedgerStore for FlakyLedgerStore {
    fn open(&mut self) -> veil_ledger::Result<Vec<ProvenanceEvent>> {
        self.inner.open()
    }

    fn append(&mut self, event: &ProvenanceEvent) -> veil_ledger::Result<()> {
        if self.failures.load(Ordering::SeqCst) > 0 {
            self.failures.fetch_sub(1, Ordering::SeqCst);
            return Err(LedgerError::Io(io::Error::new(
                io::ErrorKind::Other,
                "transient write failure",
            )));
        }
        self.inner.append(event)
    }

    fn close(&mut self) -> veil_ledger::Result<()> {
        self.inner.close()
    }
}

/// Artifact backend whose writes never succeed
struct BrokenArtifactStore {
    inner: MemoryArtifactStore,
    attempts: Arc<AtomicU32>,
}

impl ArtifactStore for BrokenArtifactStore {
    fn open(&mut self) -> veil_ledger::Result<()> {
        self.inner.open()
    }

    fn put(&mut self, _record: &ArtifactRecord) -> veil_ledger::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(LedgerError::Io(io::Error::new(
            io::ErrorKind::Other,
            "disk full",
        )))
    }

    fn get(&self, tag: &RefTag) -> veil_ledger::Result<Vec<ArtifactRecord>> {
        self.inner.get(tag)
    }

    fn close(&mut self) -> veil_ledger::Result<()> {
        self.inner.close()
    }
}

fn flaky_ledger(failures: u32, attempts: u32) -> ProvenanceLedger {
    let store = FlakyLedgerStore {
        inner: MemoryLedgerStore::new(),
        failures: Arc::new(AtomicU32::new(failures)),
    };
    ProvenanceLedger::open(Box::new(store), RetryPolicy::new(attempts)).unwrap()
}

#[test]
fn test_transient_append_failures_are_retried() {
    let ledger = flaky_ledger(2, 3);
    ledger
        .append(EventBody::new("agent", "screen_entity", "in", "out"))
        .unwrap();
    assert_eq!(ledger.len().unwrap(), 1);
}

#[test]
fn test_exhausted_append_surfaces_storage_error() {
    let ledger = flaky_ledger(5, 3);
    let result = ledger.append(EventBody::new("agent", "screen_entity", "in", "out"));
    assert!(matches!(
        result,
        Err(LedgerError::Storage { attempts: 3, .. })
    ));
    // Nothing half-written is visible
    assert!(ledger.is_empty().unwrap());

    // The next append starts a clean chain at sequence 0
    let id = ledger
        .append(EventBody::new("agent", "screen_entity", "in", "out"))
        .unwrap();
    let events = ledger.events().unwrap();
    assert_eq!(events[0].sequence, 0);
    assert_eq!(events[0].provenance_id, id);
}

#[test]
fn test_vault_commit_is_not_acknowledged_on_failure() {
    let attempts = Arc::new(AtomicU32::new(0));
    let store = BrokenArtifactStore {
        inner: MemoryArtifactStore::new(),
        attempts: Arc::clone(&attempts),
    };
    let ledger = Arc::new(ProvenanceLedger::in_memory().unwrap());
    let vault = ArtifactVault::open(Box::new(store), RetryPolicy::new(4))
        .unwrap()
        .with_ledger(Arc::clone(&ledger));

    let result = vault.commit("agent", &json!({"k": "v"}), "report");
    assert!(matches!(result, Err(LedgerError::Storage { .. })));
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
    // No audit event for a commit that never landed
    assert!(ledger.is_empty().unwrap());
}

#[test]
fn test_jsonl_export_matches_store_file() {
    let temp = TempDir::new().unwrap();
    let store_path = temp.path().join("ledger.jsonl");
    let export_path = temp.path().join("factory_logs").join("provenance_audit.jsonl");

    let ledger = ProvenanceLedger::open(
        Box::new(JsonlLedgerStore::new(&store_path)),
        RetryPolicy::default(),
    )
    .unwrap();
    for action in ["screen_entity", "check_message", "artifact_commit"] {
        ledger
            .append(EventBody::new("agent", action, "in", "out"))
            .unwrap();
    }
    ledger.export(&export_path).unwrap();
    ledger.close().unwrap();

    let stored: Vec<ProvenanceEvent> = std::fs::read_to_string(&store_path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    let exported: Vec<ProvenanceEvent> = std::fs::read_to_string(&export_path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(stored, exported);
}

#[test]
fn test_torn_tail_recovered_on_reopen() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("ledger.jsonl");
    let open = || {
        ProvenanceLedger::open(
            Box::new(JsonlLedgerStore::new(&path)),
            RetryPolicy::default(),
        )
        .unwrap()
    };

    let ledger = open();
    ledger
        .append(EventBody::new("agent", "screen_entity", "in", "out"))
        .unwrap();
    ledger.close().unwrap();

    // Crash mid-append: a fragment with no trailing newline
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .unwrap();
    io::Write::write_all(&mut file, br#"{"provenance_id":"abc"#).unwrap();
    drop(file);

    let ledger = open();
    assert_eq!(ledger.len().unwrap(), 1);
    ledger
        .append(EventBody::new("agent", "artifact_commit", "in", "out"))
        .unwrap();
    ledger.close().unwrap();

    let ledger = open();
    assert_eq!(ledger.len().unwrap(), 2);
    ledger.verify().unwrap();
    assert!(!std::fs::read_to_string(&path).unwrap().contains("\"abc"));
}

// ============================================
// Properties
// ============================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn export_preserves_append_order(actions in prop::collection::vec("[a-z_]{1,12}", 0..20)) {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("audit.jsonl");
        let ledger = ProvenanceLedger::in_memory().unwrap();

        let mut ids = Vec::new();
        for action in &actions {
            ids.push(ledger.append(EventBody::new("agent", action.as_str(), "i", "o")).unwrap());
        }
        prop_assert_eq!(ledger.export(&path).unwrap(), actions.len());

        let content = std::fs::read_to_string(&path).unwrap();
        let exported: Vec<ProvenanceEvent> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        prop_assert_eq!(exported.len(), actions.len());
        for ((event, action), id) in exported.iter().zip(&actions).zip(&ids) {
            prop_assert_eq!(&event.body.action, action);
            prop_assert_eq!(&event.provenance_id, id);
        }

        let mut unique = ids.clone();
        unique.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        unique.dedup();
        prop_assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn retrieve_returns_committed_content(
        entries in prop::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..8),
        label in "[a-z ]{0,20}",
    ) {
        let vault = ArtifactVault::in_memory().unwrap();
        let content = json!({"entries": entries, "label": label});
        let tag = vault.commit("agent", &content, "blob").unwrap();
        prop_assert_eq!(vault.retrieve(&tag).unwrap(), content);
    }
}
