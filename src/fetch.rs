//! Remote file localization for image fields.
//!
//! Image fields point at CDN URLs. The orchestrator can download them and
//! expose them as local file nodes; this crate only asks a
//! [`RemoteFileFetcher`] for a handle and stores a reference to it in the
//! image's `localFile`. A failed fetch is not an error for the document: the
//! reference becomes `null` and the failure is reported as an event.
//!
//! ## Caching
//!
//! The same image URL commonly appears in many documents (a shared logo, an
//! author portrait). Fetches are deduplicated through an [`AssetCache`] that
//! the caller creates and passes in explicitly, scoped to one build or one
//! preview session. Nothing is cached globally.
//!
//! ## Local mirror
//!
//! [`DirectoryFetcher`] resolves URLs against a local directory holding a
//! mirror of the CDN (keyed by the last path segment of the URL). It is what
//! the CLI uses; an orchestrator with network access supplies its own fetcher.

use crate::node::node_id;
use crate::types::NodeId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid URL {0}")]
    InvalidUrl(String),
    #[error("Remote file not found: {0}")]
    NotFound(String),
}

/// A localized remote file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    pub id: NodeId,
    pub url: String,
    pub path: PathBuf,
    /// SHA-256 of the file contents.
    pub content_hash: String,
}

/// Downloads (or otherwise materializes) a remote file.
pub trait RemoteFileFetcher: Sync {
    fn fetch(&self, url: &str) -> Result<FileHandle, FetchError>;
}

/// Explicitly scoped URL → file handle cache.
pub trait AssetCache: Sync {
    fn get(&self, url: &str) -> Option<FileHandle>;
    fn set(&self, url: &str, handle: FileHandle);
}

/// In-memory [`AssetCache`] for a single build or preview session.
#[derive(Debug, Default)]
pub struct MemoryAssetCache {
    entries: Mutex<HashMap<String, FileHandle>>,
    stats: Mutex<CacheStats>,
}

impl MemoryAssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit/miss counts recorded by [`localize`].
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn record(&self, hit: bool) {
        if let Ok(mut stats) = self.stats.lock() {
            if hit { stats.hit() } else { stats.miss() }
        }
    }
}

impl AssetCache for MemoryAssetCache {
    fn get(&self, url: &str) -> Option<FileHandle> {
        let found = self.entries.lock().ok()?.get(url).cloned();
        self.record(found.is_some());
        found
    }

    fn set(&self, url: &str, handle: FileHandle) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(url.to_string(), handle);
        }
    }
}

/// Fetch through the cache: a cached handle is returned without calling the
/// fetcher; a fresh handle is stored. Failures are not cached, so a later
/// document gets another attempt.
pub fn localize(
    url: &str,
    fetcher: &dyn RemoteFileFetcher,
    cache: Option<&dyn AssetCache>,
) -> Result<FileHandle, FetchError> {
    if let Some(handle) = cache.and_then(|c| c.get(url)) {
        return Ok(handle);
    }
    let handle = fetcher.fetch(url)?;
    if let Some(cache) = cache {
        cache.set(url, handle.clone());
    }
    Ok(handle)
}

/// Id of the file node for a URL.
pub fn file_node_id(url: &str) -> NodeId {
    node_id(&["remote-file", url])
}

/// Resolves URLs to files in a local mirror directory.
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path inside the mirror for a URL: the URL's last path segment.
    pub fn local_path(&self, url: &str) -> Result<PathBuf, FetchError> {
        let parsed = url::Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        let name = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;
        Ok(self.root.join(name))
    }
}

impl RemoteFileFetcher for DirectoryFetcher {
    fn fetch(&self, url: &str) -> Result<FileHandle, FetchError> {
        let path = self.local_path(url)?;
        if !path.is_file() {
            return Err(FetchError::NotFound(url.to_string()));
        }
        Ok(FileHandle {
            id: file_node_id(url),
            url: url.to_string(),
            content_hash: hash_file(&path)?,
            path,
        })
    }
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Cache hit/miss counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} fetched ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} fetched", self.misses)
        }
    }
}
