//! In-memory [`BlobStore`] implementation for tests and offline runs.
//!
//! Objects live in a `BTreeMap` behind `std::sync::RwLock`. Every operation
//! is counted so tests can assert exactly how many remote calls a higher
//! layer made, and [`MemoryBlobStore::set_offline`] makes every call fail
//! with `BackendUnavailable`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{content_sha256, BlobObject, BlobStore};
use crate::error::BlobError;

struct StoredBlob {
    content: Vec<u8>,
    version: String,
    last_modified: DateTime<Utc>,
}

/// Snapshot of per-operation call counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub read: usize,
    pub write: usize,
    pub delete: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.list + self.read + self.write + self.delete
    }
}

/// In-memory blob store.
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<String, StoredBlob>>,
    next_version: AtomicU64,
    offline: AtomicBool,
    list_calls: AtomicUsize,
    read_calls: AtomicUsize,
    write_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(BTreeMap::new()),
            next_version: AtomicU64::new(1),
            offline: AtomicBool::new(false),
            list_calls: AtomicUsize::new(0),
            read_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    /// Seed an object directly, bypassing counters and validation.
    ///
    /// Useful for simulating files uploaded by other tools (including
    /// formats the repository would refuse to write).
    pub fn insert(&self, path: &str, content: impl Into<Vec<u8>>) {
        let version = self.bump_version();
        let mut blobs = self.blobs.write().unwrap_or_else(|e| e.into_inner());
        blobs.insert(
            path.to_string(),
            StoredBlob {
                content: content.into(),
                version,
                last_modified: Utc::now(),
            },
        );
    }

    /// Make every subsequent call fail with `BackendUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            list: self.list_calls.load(Ordering::SeqCst),
            read: self.read_calls.load(Ordering::SeqCst),
            write: self.write_calls.load(Ordering::SeqCst),
            delete: self.delete_calls.load(Ordering::SeqCst),
        }
    }

    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bump_version(&self) -> String {
        format!("v{}", self.next_version.fetch_add(1, Ordering::SeqCst))
    }

    fn check_online(&self) -> Result<(), BlobError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(BlobError::BackendUnavailable(
                "in-memory store is offline".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn list(&self, prefix: &str) -> Result<Vec<BlobObject>, BlobError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let blobs = self.blobs.read().unwrap_or_else(|e| e.into_inner());
        Ok(blobs
            .iter()
            .filter(|(path, _)| path.starts_with(prefix))
            .map(|(path, blob)| BlobObject {
                path: path.clone(),
                size: blob.content.len() as u64,
                version: Some(blob.version.clone()),
                last_modified: Some(blob.last_modified),
                sha256: Some(content_sha256(&blob.content)),
            })
            .collect())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, BlobError> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let blobs = self.blobs.read().unwrap_or_else(|e| e.into_inner());
        blobs
            .get(path)
            .map(|b| b.content.clone())
            .ok_or_else(|| BlobError::NotFound(path.to_string()))
    }

    async fn write(&self, path: &str, content: &[u8], overwrite: bool) -> Result<String, BlobError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let version = self.bump_version();
        let mut blobs = self.blobs.write().unwrap_or_else(|e| e.into_inner());
        if !overwrite && blobs.contains_key(path) {
            return Err(BlobError::AlreadyExists(path.to_string()));
        }
        blobs.insert(
            path.to_string(),
            StoredBlob {
                content: content.to_vec(),
                version: version.clone(),
                last_modified: Utc::now(),
            },
        );
        Ok(version)
    }

    async fn delete(&self, path: &str) -> Result<bool, BlobError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let mut blobs = self.blobs.write().unwrap_or_else(|e| e.into_inner());
        Ok(blobs.remove(path).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_without_overwrite_conflicts() {
        let store = MemoryBlobStore::new();
        store.write("examples/sql/a.sql", b"one", false).await.unwrap();
        let err = store
            .write("examples/sql/a.sql", b"two", false)
            .await
            .unwrap_err();
        assert_eq!(err, BlobError::AlreadyExists("examples/sql/a.sql".into()));
        assert_eq!(store.read("examples/sql/a.sql").await.unwrap(), b"one");
    }

    #[tokio::test]
    async fn test_overwrite_returns_new_version() {
        let store = MemoryBlobStore::new();
        let v1 = store.write("p", b"one", true).await.unwrap();
        let v2 = store.write("p", b"two", true).await.unwrap();
        assert_ne!(v1, v2);
        assert_eq!(store.read("p").await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let store = MemoryBlobStore::new();
        let err = store.read("missing").await.unwrap_err();
        assert!(matches!(err, BlobError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_offline_fails_every_operation() {
        let store = MemoryBlobStore::new();
        store.insert("p", "x");
        store.set_offline(true);
        assert!(matches!(
            store.read("p").await,
            Err(BlobError::BackendUnavailable(_))
        ));
        assert!(matches!(
            store.list("").await,
            Err(BlobError::BackendUnavailable(_))
        ));
        assert!(matches!(
            store.write("p", b"y", true).await,
            Err(BlobError::BackendUnavailable(_))
        ));
        assert!(matches!(
            store.delete("p").await,
            Err(BlobError::BackendUnavailable(_))
        ));
        assert_eq!(store.calls().total(), 4);

        store.set_offline(false);
        assert_eq!(store.read("p").await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_list_filters_by_prefix() {
        let store = MemoryBlobStore::new();
        store.insert("examples/sql/a.sql", "a");
        store.insert("examples/data/b.csv", "b");
        let listed = store.list("examples/sql/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "examples/sql/a.sql");
        assert_eq!(listed[0].size, 1);
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let store = MemoryBlobStore::new();
        store.insert("p", "x");
        assert!(store.delete("p").await.unwrap());
        assert!(!store.delete("p").await.unwrap());
    }
}
