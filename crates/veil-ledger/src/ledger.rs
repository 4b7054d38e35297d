//! Provenance ledger
//!
//! Shared across workers. Appends take the write lock for the whole
//! id-assignment plus durable-write step, so sequence numbers follow append
//! order and a reader never sees an event before its backend write is
//! acknowledged.

use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::error::{LedgerError, Result};
use crate::event::{EventBody, ProvenanceEvent, ProvenanceId};
use crate::retry::RetryPolicy;
use crate::store::{LedgerStore, MemoryLedgerStore};

struct Inner {
    store: Box<dyn LedgerStore>,
    events: Vec<ProvenanceEvent>,
    open: bool,
}

/// Append-only, hash-chained event log
pub struct ProvenanceLedger {
    inner: RwLock<Inner>,
    retry: RetryPolicy,
}

impl ProvenanceLedger {
    /// Open `store`, load its events and verify their chain
    pub fn open(mut store: Box<dyn LedgerStore>, retry: RetryPolicy) -> Result<Self> {
        let events = store.open()?;
        verify_chain(&events)?;

        info!("Provenance ledger opened with {} events", events.len());

        Ok(Self {
            inner: RwLock::new(Inner {
                store,
                events,
                open: true,
            }),
            retry,
        })
    }

    /// Ledger over a fresh in-memory backend
    pub fn in_memory() -> Result<Self> {
        Self::open(Box::new(MemoryLedgerStore::new()), RetryPolicy::default())
    }

    /// Append an event and return its id.
    ///
    /// The event is only visible once the backend has acknowledged the
    /// write; if every retry fails nothing is appended.
    pub fn append(&self, body: EventBody) -> Result<ProvenanceId> {
        let mut inner = self.write()?;
        if !inner.open {
            return Err(LedgerError::Closed);
        }

        let sequence = inner.events.len() as u64;
        let prev_id = inner.events.last().map(|e| e.provenance_id.clone());
        let event = ProvenanceEvent::seal(body, sequence, prev_id)?;

        let store = &mut inner.store;
        self.retry.run("ledger append", || store.append(&event))?;

        let id = event.provenance_id.clone();
        debug!(
            "Appended provenance event {} (seq {}, action {})",
            id, sequence, event.body.action
        );
        inner.events.push(event);
        Ok(id)
    }

    /// Snapshot of all events in append order
    pub fn events(&self) -> Result<Vec<ProvenanceEvent>> {
        Ok(self.read()?.events.clone())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.events.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Re-derive every id and check the chain links
    pub fn verify(&self) -> Result<()> {
        verify_chain(&self.read()?.events)
    }

    /// Write every event as one JSON object per line, in append order.
    ///
    /// The target is replaced atomically, so repeated exports are safe and a
    /// reader of `path` never sees a partial file.
    pub fn export(&self, path: &Path) -> Result<usize> {
        let inner = self.read()?;

        let mut content = String::new();
        for event in &inner.events {
            content.push_str(&serde_json::to_string(event)?);
            content.push('\n');
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_extension("jsonl.tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, path)?;

        info!(
            "Exported {} provenance events to {}",
            inner.events.len(),
            path.display()
        );
        Ok(inner.events.len())
    }

    /// Close the backend. Later appends fail with [`LedgerError::Closed`];
    /// reads and exports of the loaded events keep working.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.write()?;
        if inner.open {
            inner.store.close()?;
            inner.open = false;
            debug!("Provenance ledger closed");
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| LedgerError::Storage {
            attempts: 0,
            message: "ledger lock poisoned".to_string(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| LedgerError::Storage {
            attempts: 0,
            message: "ledger lock poisoned".to_string(),
        })
    }
}

fn verify_chain(events: &[ProvenanceEvent]) -> Result<()> {
    let mut prev: Option<&ProvenanceId> = None;
    for (i, event) in events.iter().enumerate() {
        let sequence = i as u64;
        if event.sequence != sequence {
            return Err(LedgerError::ChainBroken {
                sequence,
                reason: format!("found sequence {}", event.sequence),
            });
        }
        if event.prev_id.as_ref() != prev {
            return Err(LedgerError::ChainBroken {
                sequence,
                reason: "predecessor link mismatch".to_string(),
            });
        }
        if !event.id_is_valid()? {
            return Err(LedgerError::ChainBroken {
                sequence,
                reason: "id does not match contents".to_string(),
            });
        }
        prev = Some(&event.provenance_id);
    }
    Ok(())
}
