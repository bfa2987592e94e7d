//! Per-revision fingerprint cache.
//!
//! Fingerprinting a large workspace means querying Bazel and reading every source file, so
//! the resulting [`FingerprintMap`] is stored per revision and reused by later runs that
//! compare against the same commit (the merge base of many pull requests, typically).
//!
//! # Layout
//!
//! ```text
//! {cache_dir}/
//! ├── hashes/
//! │   └── {revision}.json      # one CacheEntry per revision
//! └── .locks/
//!     └── {revision}.lock      # writer lock, see CacheLock
//! ```
//!
//! Keys are revision identifiers. Callers are expected to pass immutable commit hashes;
//! caching under a branch name would return stale maps once the branch moves.
//!
//! # Failure Semantics
//!
//! - A missing entry is a miss.
//! - An entry that cannot be parsed, has an unknown format version, or was written for a
//!   different revision is logged and treated as a miss; the next `put` overwrites it.
//! - Any other read failure is a [`DifferError::CacheReadFailed`].
//! - Write failures are [`DifferError::CacheWriteFailed`]. Callers may continue with the
//!   in-memory map.

pub mod lock;

pub use lock::CacheLock;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::DifferError;
use crate::hashing::FingerprintMap;

/// Version of the on-disk entry format. Bump when the fingerprint algorithm changes.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// On-disk representation of one cached revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub format_version: u32,
    pub revision: String,
    pub created_at: DateTime<Utc>,
    pub fingerprints: FingerprintMap,
}

/// Fingerprint map storage keyed by revision.
#[derive(Debug, Clone)]
pub enum HashCache {
    /// Every lookup misses and every store is dropped.
    Disabled,
    /// Entries stored as JSON files under a cache directory.
    Directory(DirectoryCache),
}

impl HashCache {
    /// Creates a directory-backed cache rooted at `cache_dir`.
    #[must_use]
    pub fn directory(cache_dir: impl Into<PathBuf>) -> Self {
        Self::Directory(DirectoryCache::new(cache_dir))
    }

    /// Returns `true` unless the cache is disabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    /// Looks up the fingerprint map stored for `revision`.
    ///
    /// # Errors
    ///
    /// Returns [`DifferError::CacheReadFailed`] if an entry exists but cannot be read.
    pub async fn get(&self, revision: &str) -> Result<Option<FingerprintMap>, DifferError> {
        match self {
            Self::Disabled => Ok(None),
            Self::Directory(cache) => cache.get(revision).await,
        }
    }

    /// Stores `map` for `revision`, replacing any existing entry.
    ///
    /// # Errors
    ///
    /// Returns [`DifferError::CacheWriteFailed`] if the entry cannot be written.
    pub async fn put(&self, revision: &str, map: &FingerprintMap) -> Result<(), DifferError> {
        match self {
            Self::Disabled => Ok(()),
            Self::Directory(cache) => cache.put(revision, map).await,
        }
    }
}

/// JSON-file cache under a directory.
#[derive(Debug, Clone)]
pub struct DirectoryCache {
    dir: PathBuf,
}

impl DirectoryCache {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the entry file for `revision`.
    #[must_use]
    pub fn entry_path(&self, revision: &str) -> PathBuf {
        self.dir.join("hashes").join(format!("{}.json", sanitize_key(revision)))
    }

    async fn get(&self, revision: &str) -> Result<Option<FingerprintMap>, DifferError> {
        let path = self.entry_path(revision);
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(target: "cache", "Cache miss for {}", revision);
                return Ok(None);
            }
            Err(e) => {
                return Err(DifferError::CacheReadFailed {
                    revision: revision.to_string(),
                    reason: format!("{}: {e}", path.display()),
                });
            }
        };

        let entry: CacheEntry = match serde_json::from_slice(&content) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(
                    target: "cache",
                    "Ignoring corrupt cache entry {}: {}",
                    path.display(),
                    e
                );
                return Ok(None);
            }
        };

        if entry.format_version != CACHE_FORMAT_VERSION {
            tracing::warn!(
                target: "cache",
                "Ignoring cache entry {} with format version {} (expected {})",
                path.display(),
                entry.format_version,
                CACHE_FORMAT_VERSION
            );
            return Ok(None);
        }
        if entry.revision != revision {
            tracing::warn!(
                target: "cache",
                "Ignoring cache entry {} written for revision {}",
                path.display(),
                entry.revision
            );
            return Ok(None);
        }

        tracing::debug!(
            target: "cache",
            "Cache hit for {} ({} targets, written {})",
            revision,
            entry.fingerprints.len(),
            entry.created_at
        );
        Ok(Some(entry.fingerprints))
    }

    async fn put(&self, revision: &str, map: &FingerprintMap) -> Result<(), DifferError> {
        let write_failed = |reason: String| DifferError::CacheWriteFailed {
            revision: revision.to_string(),
            reason,
        };

        let key = sanitize_key(revision);
        let _lock = CacheLock::acquire(&self.dir, &key)
            .await
            .map_err(|e| write_failed(format!("{e:#}")))?;

        let entry = CacheEntry {
            format_version: CACHE_FORMAT_VERSION,
            revision: revision.to_string(),
            created_at: Utc::now(),
            fingerprints: map.clone(),
        };
        let json = serde_json::to_vec_pretty(&entry).map_err(|e| write_failed(e.to_string()))?;

        let path = self.entry_path(revision);
        let target = path.clone();
        tokio::task::spawn_blocking(move || crate::utils::atomic_write(&target, &json))
            .await
            .map_err(|e| write_failed(e.to_string()))?
            .map_err(|e| write_failed(format!("{e:#}")))?;

        tracing::debug!(
            target: "cache",
            "Cached {} fingerprints for {} at {}",
            map.len(),
            revision,
            path.display()
        );
        Ok(())
    }
}

/// Maps a revision identifier to a safe file stem.
fn sanitize_key(revision: &str) -> String {
    revision
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::Fingerprint;
    use tempfile::TempDir;

    const REV: &str = "0123456789abcdef0123456789abcdef01234567";

    fn sample_map() -> FingerprintMap {
        let mut map = FingerprintMap::new();
        map.insert("//a:a", Fingerprint::from_bytes([1; 32]));
        map.insert("//b:b", Fingerprint::from_bytes([2; 32]));
        map
    }

    #[tokio::test]
    async fn test_disabled_cache_always_misses() {
        let cache = HashCache::Disabled;
        cache.put(REV, &sample_map()).await.unwrap();
        assert!(cache.get(REV).await.unwrap().is_none());
        assert!(!cache.is_enabled());
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let temp = TempDir::new().unwrap();
        let cache = HashCache::directory(temp.path());

        assert!(cache.get(REV).await.unwrap().is_none());
        cache.put(REV, &sample_map()).await.unwrap();
        assert_eq!(cache.get(REV).await.unwrap(), Some(sample_map()));
    }

    #[tokio::test]
    async fn test_put_is_idempotent_and_overwrites() {
        let temp = TempDir::new().unwrap();
        let cache = HashCache::directory(temp.path());

        cache.put(REV, &sample_map()).await.unwrap();
        cache.put(REV, &sample_map()).await.unwrap();
        assert_eq!(cache.get(REV).await.unwrap(), Some(sample_map()));

        let mut replaced = sample_map();
        replaced.insert("//c:c", Fingerprint::from_bytes([3; 32]));
        cache.put(REV, &replaced).await.unwrap();
        assert_eq!(cache.get(REV).await.unwrap(), Some(replaced));
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let dir = DirectoryCache::new(temp.path());
        let path = dir.entry_path(REV);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        let cache = HashCache::Directory(dir);
        assert!(cache.get(REV).await.unwrap().is_none());

        cache.put(REV, &sample_map()).await.unwrap();
        assert_eq!(cache.get(REV).await.unwrap(), Some(sample_map()));
    }

    #[tokio::test]
    async fn test_wrong_format_version_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let dir = DirectoryCache::new(temp.path());
        let entry = CacheEntry {
            format_version: CACHE_FORMAT_VERSION + 1,
            revision: REV.to_string(),
            created_at: Utc::now(),
            fingerprints: sample_map(),
        };
        let path = dir.entry_path(REV);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, serde_json::to_vec(&entry).unwrap()).unwrap();

        assert!(HashCache::Directory(dir).get(REV).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entry_for_other_revision_is_a_miss() {
        let temp = TempDir::new().unwrap();
        let cache = HashCache::directory(temp.path());
        // "feature/x" and "feature_x" sanitize to the same file
        cache.put("feature/x", &sample_map()).await.unwrap();
        assert!(cache.get("feature_x").await.unwrap().is_none());
        assert!(cache.get("feature/x").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unwritable_cache_dir() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("not-a-dir");
        std::fs::write(&file, "x").unwrap();

        let err = HashCache::directory(&file).put(REV, &sample_map()).await.unwrap_err();
        assert!(matches!(err, DifferError::CacheWriteFailed { ref revision, .. } if revision == REV));
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("abc123"), "abc123");
        assert_eq!(sanitize_key("origin/main"), "origin_main");
        assert_eq!(sanitize_key("v1.2.3"), "v1.2.3");
        assert_eq!(sanitize_key("HEAD~1"), "HEAD_1");
    }
}
