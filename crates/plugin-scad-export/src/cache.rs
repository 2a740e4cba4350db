//! Content-hash cache for change detection.
//!
//! Maps each source path to the digest of the content that was last
//! exported successfully. The cache lives for the whole build process and
//! is shared between build passes; it never stores file content.

use std::fmt;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ExportError;

/// A 128-bit content digest computed with XXH3-128.
///
/// Displayed as 32 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(u128);

impl ContentDigest {
    /// Computes the digest of a byte slice.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_128(data))
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({:08x}..)", (self.0 >> 96) as u32)
    }
}

/// Reads `path` and computes its digest.
pub async fn digest_file(path: &Path) -> Result<ContentDigest, ExportError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ExportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ContentDigest::from_bytes(&bytes))
}

/// In-memory map from source path to last exported digest.
///
/// Safe to share across concurrent per-file orchestrations. Two racing
/// registrations of the same path may both read the file; they store the
/// same digest.
#[derive(Debug, Default)]
pub struct HashCache {
    entries: DashMap<PathBuf, ContentDigest>,
}

impl HashCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a digest is stored for `path`.
    pub fn is_registered(&self, path: &Path) -> bool {
        let registered = self.entries.contains_key(path);
        debug!(file = %path.display(), registered, "Cache lookup");
        registered
    }

    /// The stored digest for `path`, if any.
    pub fn digest(&self, path: &Path) -> Option<ContentDigest> {
        self.entries.get(path).map(|entry| *entry)
    }

    /// Registers `path` with its current digest unless it is already known.
    pub async fn ensure_registered(&self, path: &Path) -> Result<(), ExportError> {
        if !self.is_registered(path) {
            self.update_hash(path).await?;
            debug!(file = %path.display(), "Registered");
        }
        Ok(())
    }

    /// Whether the current content of `path` matches the stored digest.
    ///
    /// An unregistered path never matches. The stored digest is not touched.
    pub async fn hashes_match(&self, path: &Path) -> Result<bool, ExportError> {
        let cached = self.digest(path);
        let current = digest_file(path).await?;
        debug!(
            file = %path.display(),
            cached = ?cached,
            current = ?current,
            "Comparing digests"
        );
        Ok(cached == Some(current))
    }

    /// Negation of [`HashCache::hashes_match`].
    pub async fn hashes_differ(&self, path: &Path) -> Result<bool, ExportError> {
        Ok(!self.hashes_match(path).await?)
    }

    /// Re-reads `path` and stores its digest, replacing any previous one.
    ///
    /// Nothing is stored when the read fails.
    pub async fn update_hash(&self, path: &Path) -> Result<ContentDigest, ExportError> {
        let digest = digest_file(path).await?;
        self.entries.insert(path.to_path_buf(), digest);
        Ok(digest)
    }

    /// Number of registered paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no path is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
