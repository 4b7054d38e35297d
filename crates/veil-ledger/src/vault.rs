//! Artifact vault
//!
//! Large intermediate outputs are stored once and passed around as a short
//! [`RefTag`] derived from the content hash. Identical content committed
//! twice yields the same tag and two records; retrieval returns the first.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use veil_core::{canonical_json, sha256, Digest};

use crate::error::{LedgerError, Result};
use crate::event::EventBody;
use crate::ledger::ProvenanceLedger;
use crate::retry::RetryPolicy;

/// Hex characters of the content hash carried in a tag
pub const REF_TAG_HEX_LEN: usize = 12;

/// Compact, content-derived artifact reference: `[REF:<12 hex>]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefTag(String);

impl RefTag {
    fn from_digest(digest: &Digest) -> Self {
        Self(digest.truncated_hex(REF_TAG_HEX_LEN))
    }

    /// Parse the `[REF:<hex>]` form
    pub fn parse(s: &str) -> Result<Self> {
        let hex = s
            .strip_prefix("[REF:")
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| LedgerError::NotFound(format!("malformed reference: {}", s)))?;

        if hex.len() != REF_TAG_HEX_LEN || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(LedgerError::NotFound(format!("malformed reference: {}", s)));
        }
        Ok(Self(hex.to_ascii_lowercase()))
    }

    /// The hex part, used as the storage key
    pub fn hex(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RefTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REF:{}]", self.0)
    }
}

impl TryFrom<String> for RefTag {
    type Error = LedgerError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<RefTag> for String {
    fn from(tag: RefTag) -> Self {
        tag.to_string()
    }
}

/// One stored artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub ref_tag: RefTag,
    pub agent_id: String,
    pub artifact_type: String,
    pub content: Value,
    pub created_at: DateTime<Utc>,
}

/// Persistence for artifact records, keyed by tag
pub trait ArtifactStore: Send + Sync {
    fn open(&mut self) -> Result<()>;

    /// Durably store a record; never replaces an existing one
    fn put(&mut self, record: &ArtifactRecord) -> Result<()>;

    /// All records for `tag`, oldest first
    fn get(&self, tag: &RefTag) -> Result<Vec<ArtifactRecord>>;

    fn close(&mut self) -> Result<()>;
}

/// Volatile artifact store
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    records: HashMap<RefTag, Vec<ArtifactRecord>>,
    open: bool,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn put(&mut self, record: &ArtifactRecord) -> Result<()> {
        if !self.open {
            return Err(LedgerError::Closed);
        }
        self.records
            .entry(record.ref_tag.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn get(&self, tag: &RefTag) -> Result<Vec<ArtifactRecord>> {
        if !self.open {
            return Err(LedgerError::Closed);
        }
        Ok(self.records.get(tag).cloned().unwrap_or_default())
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }
}

/// One JSON file per record: `<tag hex>/<sequence>.json`
#[derive(Debug)]
pub struct DirArtifactStore {
    base_path: PathBuf,
    next_sequence: u64,
    open: bool,
}

impl DirArtifactStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            next_sequence: 0,
            open: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.base_path
    }

    fn tag_dir(&self, tag: &RefTag) -> PathBuf {
        self.base_path.join(tag.hex())
    }

    /// Highest record sequence on disk plus one
    fn scan_next_sequence(&self) -> Result<u64> {
        let mut next = 0;
        for dir in std::fs::read_dir(&self.base_path)? {
            let dir = dir?;
            if !dir.file_type()?.is_dir() {
                continue;
            }
            for file in std::fs::read_dir(dir.path())? {
                let path = file?.path();
                if let Some(seq) = record_sequence(&path) {
                    next = next.max(seq + 1);
                }
            }
        }
        Ok(next)
    }
}

fn record_sequence(path: &Path) -> Option<u64> {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return None;
    }
    path.file_stem()?.to_str()?.parse().ok()
}

impl ArtifactStore for DirArtifactStore {
    fn open(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.base_path)?;
        self.next_sequence = self.scan_next_sequence()?;
        self.open = true;
        debug!(
            "Opened artifact store {} (next record {})",
            self.base_path.display(),
            self.next_sequence
        );
        Ok(())
    }

    fn put(&mut self, record: &ArtifactRecord) -> Result<()> {
        if !self.open {
            return Err(LedgerError::Closed);
        }

        let dir = self.tag_dir(&record.ref_tag);
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{:010}.json", self.next_sequence));
        let content = serde_json::to_string_pretty(record)?;

        // Write to temp file first, then rename for atomicity
        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, &path)?;

        self.next_sequence += 1;
        Ok(())
    }

    fn get(&self, tag: &RefTag) -> Result<Vec<ArtifactRecord>> {
        if !self.open {
            return Err(LedgerError::Closed);
        }

        let dir = self.tag_dir(tag);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files: Vec<(u64, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if let Some(seq) = record_sequence(&path) {
                files.push((seq, path));
            }
        }
        files.sort_by_key(|(seq, _)| *seq);

        files
            .into_iter()
            .map(|(_, path)| -> Result<ArtifactRecord> {
                let content = std::fs::read_to_string(&path)?;
                Ok(serde_json::from_str(&content)?)
            })
            .collect()
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }
}

/// Content-addressed artifact store with an optional provenance hook
pub struct ArtifactVault {
    store: RwLock<Box<dyn ArtifactStore>>,
    ledger: Option<Arc<ProvenanceLedger>>,
    retry: RetryPolicy,
}

impl ArtifactVault {
    pub fn open(mut store: Box<dyn ArtifactStore>, retry: RetryPolicy) -> Result<Self> {
        store.open()?;
        Ok(Self {
            store: RwLock::new(store),
            ledger: None,
            retry,
        })
    }

    /// Vault over a fresh in-memory store
    pub fn in_memory() -> Result<Self> {
        Self::open(Box::new(MemoryArtifactStore::new()), RetryPolicy::default())
    }

    /// Record every commit in `ledger`
    pub fn with_ledger(mut self, ledger: Arc<ProvenanceLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Store `content` and return its reference tag.
    ///
    /// The tag is the truncated SHA-256 of the canonical JSON of `content`.
    /// When a ledger is attached, an `artifact_commit` event carrying the
    /// full content hash is appended after the record is stored.
    pub fn commit<T: Serialize + ?Sized>(
        &self,
        agent_id: &str,
        content: &T,
        artifact_type: &str,
    ) -> Result<RefTag> {
        let canonical = canonical_json(content)?;
        let digest = Digest::new(sha256(canonical.as_bytes()));
        let ref_tag = RefTag::from_digest(&digest);

        let record = ArtifactRecord {
            ref_tag: ref_tag.clone(),
            agent_id: agent_id.to_string(),
            artifact_type: artifact_type.to_string(),
            content: serde_json::from_str(&canonical)?,
            created_at: Utc::now(),
        };

        {
            let mut store = self.write()?;
            self.retry.run("artifact commit", || store.put(&record))?;
        }

        debug!("Committed {} artifact {}", artifact_type, ref_tag);

        if let Some(ledger) = &self.ledger {
            ledger.append(EventBody::new(
                agent_id,
                "artifact_commit",
                digest.to_hex(),
                ref_tag.to_string(),
            ))?;
        }

        Ok(ref_tag)
    }

    /// Content of the first record committed under `tag`
    pub fn retrieve(&self, tag: &RefTag) -> Result<Value> {
        self.records(tag)?
            .into_iter()
            .next()
            .map(|r| r.content)
            .ok_or_else(|| LedgerError::NotFound(tag.to_string()))
    }

    /// Every record stored under `tag`, oldest first
    pub fn records(&self, tag: &RefTag) -> Result<Vec<ArtifactRecord>> {
        self.read()?.get(tag)
    }

    pub fn close(&self) -> Result<()> {
        self.write()?.close()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Box<dyn ArtifactStore>>> {
        self.store.read().map_err(|_| LedgerError::Storage {
            attempts: 0,
            message: "vault lock poisoned".to_string(),
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Box<dyn ArtifactStore>>> {
        self.store.write().map_err(|_| LedgerError::Storage {
            attempts: 0,
            message: "vault lock poisoned".to_string(),
        })
    }
}
