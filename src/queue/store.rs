//! Persisted-state backends for the pending queue
//!
//! The queue itself only ever calls [`QueueStore::load`] once at startup and
//! [`QueueStore::save`] with the full queue state inside its critical
//! sections, so a backend can be anything that can read and atomically
//! replace a small document: a local file, a database row, a remote API. A
//! backend that natively supports atomic read-matching/delete could back a
//! bespoke queue implementation instead; the two shipped here are the JSON
//! file store used in production and an in-memory store for tests and
//! embedded use.

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use super::pending::PendingNotification;

/// Error from a queue store operation
#[derive(Debug)]
pub enum StoreError {
    /// Underlying I/O failure
    Io(std::io::Error),
    /// Persisted state failed to serialize or deserialize
    Serde(serde_json::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "store I/O error: {}", e),
            StoreError::Serde(e) => write!(f, "store serialization error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            StoreError::Serde(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serde(e)
    }
}

/// Backend behind the durable queue
///
/// Implementations must be cheap and local; `save` runs inside the queue's
/// critical section and must never be a slow network round trip.
pub trait QueueStore: Send + Sync {
    /// Read the full persisted queue state
    fn load(&self) -> Result<Vec<PendingNotification>, StoreError>;

    /// Replace the full persisted queue state
    fn save(&self, entries: &[PendingNotification]) -> Result<(), StoreError>;
}

/// JSON file backend
///
/// Saves write to a sibling temp file and rename over the target, so a crash
/// mid-write leaves the previous state intact.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store backed by `path`; the file need not exist yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl QueueStore for FileStore {
    fn load(&self) -> Result<Vec<PendingNotification>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let raw = fs::read_to_string(&self.path)?;
        let entries = serde_json::from_str(&raw)?;
        Ok(entries)
    }

    fn save(&self, entries: &[PendingNotification]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(entries)?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw.as_bytes())?;
        fs::rename(&tmp, &self.path)?;

        Ok(())
    }
}

/// In-memory backend, nothing survives the process
///
/// Useful in tests and in embedded setups that do not need durability.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<PendingNotification>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl QueueStore for MemoryStore {
    fn load(&self) -> Result<Vec<PendingNotification>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.clone())
    }

    fn save(&self, entries: &[PendingNotification]) -> Result<(), StoreError> {
        let mut slot = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        *slot = entries.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::protocol::Filter;

    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("relay-rs-{}-{}.json", name, std::process::id()));
        path
    }

    fn entry(id: u64) -> PendingNotification {
        PendingNotification::new(id, Filter::for_user("u1"), json!("payload"))
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let store = FileStore::new(temp_path("missing"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_round_trip() {
        let path = temp_path("round-trip");
        let store = FileStore::new(&path);

        store.save(&[entry(1), entry(2)]).unwrap();
        let loaded = store.load().unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, 1);
        assert_eq!(loaded[1].id, 2);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_file_store_overwrites_previous_state() {
        let path = temp_path("overwrite");
        let store = FileStore::new(&path);

        store.save(&[entry(1), entry(2)]).unwrap();
        store.save(&[entry(3)]).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, 3);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_file_store_corrupt_file_errors() {
        let path = temp_path("corrupt");
        fs::write(&path, b"{{{not json").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(store.load(), Err(StoreError::Serde(_))));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        store.save(&[entry(7)]).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, 7);
    }
}
