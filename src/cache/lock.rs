//! File locking for cache entries.
//!
//! Two bazel-differ processes sharing a cache directory (for example parallel CI jobs on the
//! same runner) may compute the same revision at the same time. Writers take an exclusive
//! lock per revision so that the temp-file-and-rename sequence of one writer never races
//! another's. The lock is released when the [`CacheLock`] is dropped.

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// An exclusive lock on one cache key.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Acquires the exclusive lock for `key`, waiting for any other holder to release it.
    ///
    /// The lock file lives at `{cache_dir}/.locks/{key}.lock` and is never deleted. The
    /// blocking lock call runs on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the locks directory or lock file cannot be created, or if the
    /// filesystem does not support locking.
    pub async fn acquire(cache_dir: &Path, key: &str) -> Result<Self> {
        let locks_dir = cache_dir.join(".locks");
        tokio::fs::create_dir_all(&locks_dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotADirectory {
                anyhow::anyhow!(
                    "Cannot create directory: cache path is not a directory ({})",
                    cache_dir.display()
                )
            } else if e.kind() == std::io::ErrorKind::PermissionDenied {
                anyhow::anyhow!(
                    "Permission denied: cannot create locks directory at {}",
                    locks_dir.display()
                )
            } else {
                anyhow::anyhow!("Failed to create directory {}: {}", locks_dir.display(), e)
            }
        })?;

        let lock_path = locks_dir.join(format!("{key}.lock"));
        let lock_path_clone = lock_path.clone();
        let key = key.to_string();

        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&lock_path_clone)
                .with_context(|| {
                    format!("Failed to open lock file: {}", lock_path_clone.display())
                })?;

            file.lock_exclusive().with_context(|| format!("Failed to acquire lock for: {key}"))?;

            Ok(file)
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        tracing::trace!(target: "cache", "Acquired lock {}", lock_path.display());

        Ok(Self {
            file,
            path: lock_path,
        })
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        // Closing the handle releases the lock as well; unlocking explicitly surfaces errors
        #[allow(unstable_name_collisions)]
        if let Err(e) = self.file.unlock() {
            tracing::warn!(target: "cache", "Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}
