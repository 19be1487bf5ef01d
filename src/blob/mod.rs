//! Blob storage abstraction.
//!
//! The [`BlobStore`] trait is the thin contract the artifact repository is
//! built on: list, read, write, delete. Implementations carry no business
//! logic, no caching, and no retries. Every call reaches the backend once.
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`azure::AzureBlobStore`] | Azure Blob Storage over the REST API |
//! | [`memory::MemoryBlobStore`] | Tests and offline runs |

pub mod azure;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::BlobError;

/// Properties of a listed blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobObject {
    /// Full path within the container (e.g. `examples/sql/a.sql`).
    pub path: String,
    pub size: u64,
    /// Opaque revision token (version id or ETag).
    pub version: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    /// Hex SHA-256 recorded in blob metadata at upload time, if any.
    pub sha256: Option<String>,
}

/// Remote object store used by the repository.
///
/// # Operations
///
/// | Method | Errors |
/// |--------|--------|
/// | [`list`](BlobStore::list) | `BackendUnavailable` |
/// | [`read`](BlobStore::read) | `NotFound`, `BackendUnavailable` |
/// | [`write`](BlobStore::write) | `AlreadyExists` (without overwrite), `BackendUnavailable` |
/// | [`delete`](BlobStore::delete) | `BackendUnavailable` |
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List every object whose path starts with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<BlobObject>, BlobError>;

    /// Read an object's bytes.
    async fn read(&self, path: &str) -> Result<Vec<u8>, BlobError>;

    /// Write an object and return the new version token.
    async fn write(&self, path: &str, content: &[u8], overwrite: bool) -> Result<String, BlobError>;

    /// Delete an object. Returns `false` if it did not exist.
    async fn delete(&self, path: &str) -> Result<bool, BlobError>;
}

/// Hex-encoded SHA-256 of a payload, as recorded in blob metadata.
pub fn content_sha256(content: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(content))
}
