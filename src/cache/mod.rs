//! File-backed stream cache
//!
//! One JSON file per episode URL, named after a digest of the URL. Entries
//! older than the freshness window are ignored on read but left on disk until
//! overwritten or cleared. Writes and clears are serialized per instance;
//! reads are not.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::constants::cache::{DEFAULT_TTL_MS, KEY_DIGEST_LEN, KEY_EXTENSION, KEY_PREFIX};
use crate::models::{CacheEntry, StreamSource};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache entry encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CacheError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// File name of the entry for `url`: `stream_<16 hex chars of sha256>.json`
pub fn cache_key(url: &str) -> String {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    format!("{}{}.{}", KEY_PREFIX, &digest[..KEY_DIGEST_LEN], KEY_EXTENSION)
}

fn is_entry_file(name: &str) -> bool {
    name.starts_with(KEY_PREFIX) && name.ends_with(&format!(".{}", KEY_EXTENSION))
}

/// Time-bounded cache of stream resolutions
pub struct StreamCache {
    root: PathBuf,
    ttl_ms: i64,
    write_lock: Mutex<()>,
}

impl StreamCache {
    /// Cache under `root` with the default 24 hour window
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_ttl(root, DEFAULT_TTL_MS)
    }

    pub fn with_ttl(root: impl Into<PathBuf>, ttl_ms: i64) -> Self {
        Self {
            root: root.into(),
            ttl_ms,
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        self.root.join(cache_key(url))
    }

    /// Fresh sources for `url`; unreadable, corrupt or expired entries are a miss
    pub async fn get(&self, url: &str) -> Option<Vec<StreamSource>> {
        self.get_at(url, Utc::now().timestamp_millis()).await
    }

    async fn get_at(&self, url: &str, now_ms: i64) -> Option<Vec<StreamSource>> {
        let path = self.entry_path(url);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read cache entry {}: {}", path.display(), e);
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Ignoring corrupt cache entry {}: {}", path.display(), e);
                return None;
            }
        };

        if entry.is_fresh(now_ms, self.ttl_ms) {
            debug!("Cache hit for {}", url);
            Some(entry.sources)
        } else {
            debug!("Cache entry for {} expired", url);
            None
        }
    }

    /// Store `sources` for `url`; failures are logged and swallowed
    pub async fn put(&self, url: &str, sources: &[StreamSource]) {
        let entry = CacheEntry {
            sources: sources.to_vec(),
            timestamp_ms: Utc::now().timestamp_millis(),
        };
        if let Err(e) = self.write_entry(url, &entry).await {
            warn!("Failed to cache streams for {}: {}", url, e);
        }
    }

    async fn write_entry(&self, url: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        let body = serde_json::to_vec(entry)?;
        let path = self.entry_path(url);
        let staging = path.with_extension("tmp");

        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| CacheError::io(&self.root, e))?;
        tokio::fs::write(&staging, &body)
            .await
            .map_err(|e| CacheError::io(&staging, e))?;
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
                warn!("Failed to remove staging file {}: {}", staging.display(), cleanup);
            }
            return Err(CacheError::io(&path, e));
        }

        debug!("Cached {} streams for {} at {}", entry.sources.len(), url, path.display());
        Ok(())
    }

    /// Remove every entry; returns how many were deleted
    pub async fn clear(&self) -> usize {
        let _guard = self.write_lock.lock().await;
        match self.remove_entries().await {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Failed to clear stream cache: {}", e);
                0
            }
        }
    }

    async fn remove_entries(&self) -> Result<usize, CacheError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(CacheError::io(&self.root, e)),
        };

        let mut removed = 0;
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| CacheError::io(&self.root, e))?
        {
            let name = item.file_name();
            if !is_entry_file(&name.to_string_lossy()) {
                continue;
            }
            let path = item.path();
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| CacheError::io(&path, e))?;
            removed += 1;
        }
        Ok(removed)
    }
}
