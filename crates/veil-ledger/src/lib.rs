//! Veil Ledger - Provenance ledger and artifact vault
//!
//! Two long-lived, process-wide resources shared by every screening worker:
//!
//! - [`ProvenanceLedger`]: append-only, hash-chained record of every
//!   privacy-sensitive operation, exportable as newline-delimited JSON.
//! - [`ArtifactVault`]: content-addressed store that hands out a short
//!   [`RefTag`] in place of large payloads.
//!
//! Both sit on explicitly constructed storage backends with an
//! `open`/`close` lifecycle. Backend writes are retried a bounded number of
//! times before surfacing [`LedgerError::Storage`].

pub mod error;
pub mod event;
pub mod ledger;
pub mod retry;
pub mod store;
pub mod vault;

pub use error::{LedgerError, Result};
pub use event::{EventBody, ProvenanceEvent, ProvenanceId, PROVENANCE_ID_LEN};
pub use ledger::ProvenanceLedger;
pub use retry::RetryPolicy;
pub use store::{JsonlLedgerStore, LedgerStore, MemoryLedgerStore};
pub use vault::{
    ArtifactRecord, ArtifactStore, ArtifactVault, DirArtifactStore, MemoryArtifactStore, RefTag,
    REF_TAG_HEX_LEN,
};
