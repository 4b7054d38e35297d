//! Ledger storage backends
//!
//! A backend is constructed explicitly and handed to
//! [`ProvenanceLedger::open`](crate::ProvenanceLedger::open); there is no
//! process-global connection. `open` returns the events already stored,
//! `append` must not return until the event is durable, and `close`
//! releases the backend. Any call after `close` fails with
//! [`LedgerError::Closed`].

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{LedgerError, Result};
use crate::event::ProvenanceEvent;

/// Append-only persistence for provenance events
pub trait LedgerStore: Send + Sync {
    /// Open the backend and load its events in append order
    fn open(&mut self) -> Result<Vec<ProvenanceEvent>>;

    /// Durably append one event
    fn append(&mut self, event: &ProvenanceEvent) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// Volatile backend for tests and single-shot runs
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    events: Vec<ProvenanceEvent>,
    open: bool,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn open(&mut self) -> Result<Vec<ProvenanceEvent>> {
        self.open = true;
        Ok(self.events.clone())
    }

    fn append(&mut self, event: &ProvenanceEvent) -> Result<()> {
        if !self.open {
            return Err(LedgerError::Closed);
        }
        self.events.push(event.clone());
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }
}

/// One JSON event per line, appended and synced on every write
#[derive(Debug)]
pub struct JsonlLedgerStore {
    path: PathBuf,
    file: Option<File>,
}

impl JsonlLedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Events on complete lines, plus the byte length those lines cover.
    /// Bytes after the last newline belong to an interrupted append.
    fn load(&self) -> Result<(Vec<ProvenanceEvent>, u64)> {
        if !self.path.exists() {
            return Ok((Vec::new(), 0));
        }

        let content = std::fs::read(&self.path)?;
        let complete = content
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1);

        let mut events = Vec::new();
        for (n, line) in content[..complete].split(|&b| b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let event: ProvenanceEvent = serde_json::from_slice(line).map_err(|e| {
                LedgerError::Serialization(format!("line {}: {}", n + 1, e))
            })?;
            events.push(event);
        }
        Ok((events, complete as u64))
    }
}

impl LedgerStore for JsonlLedgerStore {
    fn open(&mut self) -> Result<Vec<ProvenanceEvent>> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let (events, complete_len) = self.load()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let file_len = file.metadata()?.len();
        if file_len > complete_len {
            warn!(
                "Discarding {} bytes of incomplete trailing record in {}",
                file_len - complete_len,
                self.path.display()
            );
            file.set_len(complete_len)?;
            file.sync_data()?;
        }
        self.file = Some(file);

        debug!(
            "Opened ledger store {} ({} events)",
            self.path.display(),
            events.len()
        );
        Ok(events)
    }

    fn append(&mut self, event: &ProvenanceEvent) -> Result<()> {
        let file = self.file.as_mut().ok_or(LedgerError::Closed)?;
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let prev_len = file.metadata()?.len();
        let written = file
            .write_all(line.as_bytes())
            .and_then(|()| file.sync_data());
        if let Err(e) = written {
            // Leave a clean end of file for the retry
            file.set_len(prev_len)?;
            return Err(e.into());
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBody;
    use tempfile::TempDir;

    fn event(seq: u64) -> ProvenanceEvent {
        let body = EventBody::new("agent", "test", "in", "out");
        ProvenanceEvent::seal(body, seq, None).unwrap()
    }

    #[test]
    fn test_memory_store_requires_open() {
        let mut store = MemoryLedgerStore::new();
        assert!(matches!(store.append(&event(0)), Err(LedgerError::Closed)));
        store.open().unwrap();
        store.append(&event(0)).unwrap();
        store.close().unwrap();
        assert!(matches!(store.append(&event(1)), Err(LedgerError::Closed)));
    }

    #[test]
    fn test_jsonl_store_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("ledger").join("events.jsonl");

        let mut store = JsonlLedgerStore::new(&path);
        assert!(store.open().unwrap().is_empty());
        store.append(&event(0)).unwrap();
        store.append(&event(1)).unwrap();
        store.close().unwrap();

        let mut reopened = JsonlLedgerStore::new(&path);
        let events = reopened.open().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].sequence, 1);
    }

    #[test]
    fn test_jsonl_store_rejects_garbage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("events.jsonl");
        std::fs::write(&path, "not json\n").unwrap();

        let mut store = JsonlLedgerStore::new(&path);
        assert!(matches!(
            store.open(),
            Err(LedgerError::Serialization(_))
        ));
    }

    #[test]
    fn test_jsonl_store_drops_torn_tail() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("events.jsonl");

        let mut store = JsonlLedgerStore::new(&path);
        store.open().unwrap();
        store.append(&event(0)).unwrap();
        store.close().unwrap();
        let clean_len = std::fs::metadata(&path).unwrap().len();

        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(br#"{"provenance_id":"ab"#).unwrap();
        drop(file);

        let mut reopened = JsonlLedgerStore::new(&path);
        assert_eq!(reopened.open().unwrap().len(), 1);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), clean_len);

        reopened.append(&event(1)).unwrap();
        reopened.close().unwrap();
        assert_eq!(JsonlLedgerStore::new(&path).open().unwrap().len(), 2);
    }

    #[test]
    fn test_jsonl_append_after_close() {
        let temp = TempDir::new().unwrap();
        let mut store = JsonlLedgerStore::new(temp.path().join("events.jsonl"));
        store.open().unwrap();
        store.close().unwrap();
        assert!(matches!(store.append(&event(0)), Err(LedgerError::Closed)));
    }
}
