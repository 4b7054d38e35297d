//! Watchlist sources
//!
//! Watchlists arrive from an external provider as blind-indexed entries
//! only. The service never sees plaintext names or identifiers.

use std::path::PathBuf;

use tracing::debug;

use veil_core::WatchlistEntry;

use crate::error::Result;

/// Collaborator that supplies the current watchlist
pub trait WatchlistSource: Send + Sync {
    fn fetch(&self) -> Result<Vec<WatchlistEntry>>;
}

/// Fixed, in-memory watchlist
#[derive(Debug, Clone, Default)]
pub struct StaticWatchlist {
    entries: Vec<WatchlistEntry>,
}

impl StaticWatchlist {
    pub fn new(entries: Vec<WatchlistEntry>) -> Self {
        Self { entries }
    }
}

impl WatchlistSource for StaticWatchlist {
    fn fetch(&self) -> Result<Vec<WatchlistEntry>> {
        Ok(self.entries.clone())
    }
}

/// JSON array of [`WatchlistEntry`] records, re-read on every fetch
#[derive(Debug, Clone)]
pub struct FileWatchlist {
    path: PathBuf,
}

impl FileWatchlist {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WatchlistSource for FileWatchlist {
    fn fetch(&self) -> Result<Vec<WatchlistEntry>> {
        let content = std::fs::read_to_string(&self.path)?;
        let entries: Vec<WatchlistEntry> = serde_json::from_str(&content)?;
        debug!(
            "Loaded {} watchlist entries from {}",
            entries.len(),
            self.path.display()
        );
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use veil_core::BlindIndex;

    #[test]
    fn test_file_watchlist_holds_only_hashes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("watchlist.json");
        let entries = vec![
            WatchlistEntry::new("SDN-1", BlindIndex::create("Blocked Trading LLC", b"s")),
            WatchlistEntry::new("SDN-2", BlindIndex::create("Embargoed Shipping", b"s")),
        ];
        std::fs::write(&path, serde_json::to_string(&entries).unwrap()).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("Blocked Trading"));

        let loaded = FileWatchlist::new(&path).fetch().unwrap();
        assert_eq!(loaded, entries);
    }

    #[test]
    fn test_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(FileWatchlist::new(temp.path().join("absent.json"))
            .fetch()
            .is_err());
    }
}
