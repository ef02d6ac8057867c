//! Host key-value stores holding the encoded snapshot.
//!
//! # Responsibility
//! - Define the minimal async contract the persistence adapter needs.
//! - Provide an in-process store and a directory-backed store.
//!
//! # Invariants
//! - `set` replaces the whole value for a key; readers never see a partial write
//!   from `FileKeyValueStore` (temp file + rename).

use async_trait::async_trait;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Host store failure.
#[derive(Debug)]
pub enum KvError {
    Io(std::io::Error),
    /// The store refused the write (e.g. quota exceeded).
    Rejected(String),
    InvalidKey(String),
}

impl Display for KvError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "key-value store I/O error: {err}"),
            Self::Rejected(message) => write!(f, "key-value store rejected write: {message}"),
            Self::InvalidKey(key) => write!(f, "invalid key-value store key: `{key}`"),
        }
    }
}

impl Error for KvError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Rejected(_) | Self::InvalidKey(_) => None,
        }
    }
}

impl From<std::io::Error> for KvError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Durable string key-value store provided by the host environment.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;
    async fn set(&self, key: &str, value: String) -> Result<(), KvError>;
}

/// In-process store. Survives store re-construction when shared by `Arc`.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
    reject_writes: AtomicBool,
    reject_reads: AtomicBool,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `set` fail, as a full quota would.
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Makes every following `get` fail with an I/O error.
    pub fn set_reject_reads(&self, reject: bool) {
        self.reject_reads.store(reject, Ordering::SeqCst);
    }

    /// Synchronous read for tests and diagnostics.
    pub fn peek(&self, key: &str) -> Option<String> {
        self.lock_entries().get(key).cloned()
    }

    /// Synchronous write for seeding state.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock_entries().insert(key.into(), value.into());
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a consistent map: writes are single inserts.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        if self.reject_reads.load(Ordering::SeqCst) {
            return Err(KvError::Io(std::io::Error::other("reads disabled")));
        }
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), KvError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(KvError::Rejected("quota exceeded".to_string()));
        }
        self.lock_entries().insert(key.to_string(), value);
        Ok(())
    }
}

/// Directory-backed store: one file per key.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// Creates the store; the directory is created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, KvError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(KvError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.kv")))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), KvError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let staging = path.with_extension("kv.tmp");
        tokio::fs::write(&staging, value).await?;
        tokio::fs::rename(&staging, &path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{FileKeyValueStore, KeyValueStore, KvError, MemoryKeyValueStore};

    #[tokio::test]
    async fn file_store_round_trips_and_reports_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::new(dir.path().join("nested"));

        assert_eq!(store.get("cantinaDb").await.unwrap(), None);
        store.set("cantinaDb", "1,2,3".to_string()).await.unwrap();
        store.set("cantinaDb", "4,5".to_string()).await.unwrap();
        assert_eq!(
            store.get("cantinaDb").await.unwrap().as_deref(),
            Some("4,5")
        );
    }

    #[tokio::test]
    async fn file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileKeyValueStore::new(dir.path());
        let err = store.set("../escape", String::new()).await.unwrap_err();
        assert!(matches!(err, KvError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn memory_store_can_simulate_quota_errors() {
        let store = MemoryKeyValueStore::new();
        store.set_reject_writes(true);
        let err = store.set("k", "v".to_string()).await.unwrap_err();
        assert!(matches!(err, KvError::Rejected(_)));
        assert_eq!(store.peek("k"), None);
    }

    #[tokio::test]
    async fn memory_store_can_simulate_read_failures() {
        let store = MemoryKeyValueStore::new();
        store.insert("k", "v");
        store.set_reject_reads(true);

        let err = store.get("k").await.unwrap_err();
        assert!(matches!(err, KvError::Io(ref io) if io.kind() == std::io::ErrorKind::Other));

        store.set_reject_reads(false);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
    }
}
