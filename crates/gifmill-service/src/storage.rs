//! Blob storage: async `get`/`put` of opaque byte blobs by identifier.
//!
//! Identifiers look like `<prefix>/<millis>_<seq>.<ext>`, for example
//! `gif_output/1718000000000_3.gif`. Every identifier is a relative,
//! slash-separated path without `.`/`..` segments, so a filesystem store can
//! map it under its root without escaping it.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reference to a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobId(String);

impl BlobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BlobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for BlobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Blob store failures. Messages are forwarded verbatim to job responses.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob not found: {0}")]
    NotFound(BlobId),

    #[error("invalid blob id '{0}'")]
    InvalidId(String),

    #[error("storage transport error: {0}")]
    Transport(String),
}

/// Async blob storage.
pub trait BlobStore: Send + Sync {
    /// Fetch the bytes stored under `id`.
    fn get(&self, id: &BlobId) -> impl Future<Output = Result<Vec<u8>, StorageError>> + Send;

    /// Store `bytes` under a fresh id in `prefix` with file `extension`.
    fn put(
        &self,
        prefix: &str,
        extension: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<BlobId, StorageError>> + Send;
}

/// Check that `id` is a safe relative path.
pub fn validate_id(id: &str) -> Result<(), StorageError> {
    let invalid = id.is_empty()
        || id.starts_with('/')
        || id.contains('\\')
        || id.contains('\0')
        || id.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");

    if invalid {
        Err(StorageError::InvalidId(id.to_string()))
    } else {
        Ok(())
    }
}

/// Monotonic id generator shared by the store implementations.
#[derive(Debug, Default)]
struct IdGenerator {
    seq: AtomicU64,
}

impl IdGenerator {
    fn next(&self, prefix: &str, extension: &str) -> Result<BlobId, StorageError> {
        validate_id(prefix)?;
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StorageError::InvalidId(format!("{}/*.{}", prefix, extension)));
        }

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        Ok(BlobId(format!("{}/{}_{}.{}", prefix, millis, seq, extension)))
    }
}

/// In-process blob store.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<BlobId, Vec<u8>>>,
    ids: IdGenerator,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` under a caller-chosen id.
    pub fn insert(&self, id: impl Into<BlobId>, bytes: Vec<u8>) {
        self.lock().insert(id.into(), bytes);
    }

    pub fn contains(&self, id: &BlobId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<BlobId, Vec<u8>>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl BlobStore for MemoryBlobStore {
    async fn get(&self, id: &BlobId) -> Result<Vec<u8>, StorageError> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.clone()))
    }

    async fn put(&self, prefix: &str, extension: &str, bytes: Vec<u8>) -> Result<BlobId, StorageError> {
        let id = self.ids.next(prefix, extension)?;
        self.lock().insert(id.clone(), bytes);
        Ok(id)
    }
}

/// Blob store rooted at a local directory.
#[derive(Debug)]
pub struct FsBlobStore {
    root: PathBuf,
    ids: IdGenerator,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ids: IdGenerator::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for `id`, rejecting ids that would leave the root.
    pub fn path_of(&self, id: &BlobId) -> Result<PathBuf, StorageError> {
        validate_id(id.as_str())?;
        Ok(self.root.join(id.as_str()))
    }
}

impl BlobStore for FsBlobStore {
    async fn get(&self, id: &BlobId) -> Result<Vec<u8>, StorageError> {
        let path = self.path_of(id)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(id.clone()),
            _ => StorageError::Transport(format!("{}: {}", path.display(), e)),
        })
    }

    async fn put(&self, prefix: &str, extension: &str, bytes: Vec<u8>) -> Result<BlobId, StorageError> {
        let id = self.ids.next(prefix, extension)?;
        let path = self.path_of(&id)?;
        let transport = |e: io::Error| StorageError::Transport(format!("{}: {}", path.display(), e));

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(transport)?;
        }
        tokio::fs::write(&path, bytes).await.map_err(transport)?;

        log::debug!("Stored {} ({})", id, path.display());
        Ok(id)
    }
}
