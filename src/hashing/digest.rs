//! Digests for individual source references.
//!
//! A source reference is a label such as `//pkg:file.txt` or `//pkg:data_dir` that may
//! point at a file or a whole directory inside the workspace. Its digest covers the file
//! contents (or the contents of every file below the directory), the caller-supplied digest
//! bytes, and the reference name itself.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::filesystem::{EntryKind, Filesystem, OsFilesystem};
use crate::core::{CancellationToken, DifferError};

/// Prefix of labels that refer to the main workspace.
const ROOT_PREFIX: &str = "//";

/// A source reference with its resolved 32-byte digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFileTarget {
    name: String,
    digest: [u8; 32],
}

impl SourceFileTarget {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }
}

/// Computes [`SourceFileTarget`] digests relative to a workspace directory.
#[derive(Clone)]
pub struct SourceDigester {
    working_dir: Option<PathBuf>,
    fs: Arc<dyn Filesystem>,
}

impl std::fmt::Debug for SourceDigester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDigester").field("working_dir", &self.working_dir).finish()
    }
}

impl SourceDigester {
    /// Creates a digester reading from the real filesystem.
    ///
    /// With `working_dir` set to `None`, no reference is ever resolved on disk.
    #[must_use]
    pub fn new(working_dir: Option<PathBuf>) -> Self {
        Self::with_filesystem(working_dir, Arc::new(OsFilesystem))
    }

    /// Creates a digester over an injected filesystem.
    #[must_use]
    pub fn with_filesystem(working_dir: Option<PathBuf>, fs: Arc<dyn Filesystem>) -> Self {
        Self {
            working_dir,
            fs,
        }
    }

    #[must_use]
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// Maps a workspace label to its on-disk path, or `None` for labels that cannot be
    /// resolved (external repositories, or no working directory configured).
    ///
    /// `//pkg/sub:file.txt` resolves to `<working_dir>/pkg/sub/file.txt` and `//:README`
    /// to `<working_dir>/README`.
    #[must_use]
    pub fn resolve_path(&self, name: &str) -> Option<PathBuf> {
        let working_dir = self.working_dir.as_ref()?;
        let relative = name.strip_prefix(ROOT_PREFIX)?;
        let relative = relative.replacen(':', "/", 1);
        Some(working_dir.join(relative.trim_start_matches('/')))
    }

    /// Digests a single source reference.
    ///
    /// The bytes hashed are the file contents (or the sorted per-file digests of a
    /// directory), then `caller_digest`, then `name`. A reference that does not resolve to
    /// an existing path contributes only `caller_digest` and `name`.
    ///
    /// # Errors
    ///
    /// - [`DifferError::SourceDigestFailed`] if the file or directory exists but cannot be
    ///   read
    /// - [`DifferError::Cancelled`] if `cancel` fires before a read
    pub fn digest(
        &self,
        name: &str,
        caller_digest: &[u8],
        cancel: &CancellationToken,
    ) -> Result<SourceFileTarget, DifferError> {
        let mut hasher = Sha256::new();

        if let Some(path) = self.resolve_path(name) {
            self.fold_path(&mut hasher, name, &path, cancel)?;
        }

        hasher.update(caller_digest);
        hasher.update(name.as_bytes());

        Ok(SourceFileTarget {
            name: name.to_string(),
            digest: hasher.finalize().into(),
        })
    }

    fn fold_path(
        &self,
        hasher: &mut Sha256,
        name: &str,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), DifferError> {
        cancel.check()?;
        let fail = |reason: String| DifferError::SourceDigestFailed {
            name: name.to_string(),
            path: path.display().to_string(),
            reason,
        };

        match self.fs.entry_kind(path).map_err(|e| fail(e.to_string()))? {
            None => {
                tracing::debug!(
                    target: "hashing",
                    "Source {} does not exist at {}, digesting name only",
                    name,
                    path.display()
                );
            }
            Some(EntryKind::Directory) => {
                for (_, file_digest) in self.walk_directory(name, path, cancel)? {
                    hasher.update(file_digest);
                }
            }
            Some(EntryKind::File) => {
                let contents = self.fs.read(path).map_err(|e| fail(e.to_string()))?;
                hasher.update(&contents);
            }
            Some(EntryKind::Other) => {
                tracing::debug!(
                    target: "hashing",
                    "Source {} at {} is not a regular file, digesting name only",
                    name,
                    path.display()
                );
            }
        }

        Ok(())
    }

    /// Returns `(relative path, XXH3-128 digest)` for every regular file below `root`,
    /// sorted by `/`-separated relative path.
    fn walk_directory(
        &self,
        name: &str,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<(String, [u8; 16])>, DifferError> {
        let fail = |path: &Path, reason: String| DifferError::SourceDigestFailed {
            name: name.to_string(),
            path: path.display().to_string(),
            reason,
        };

        let mut files = Vec::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            cancel.check()?;
            let children = self.fs.read_dir(&dir).map_err(|e| fail(&dir, e.to_string()))?;

            for child in children {
                match self.fs.entry_kind_no_follow(&child).map_err(|e| fail(&child, e.to_string()))? {
                    Some(EntryKind::Directory) => pending.push(child),
                    Some(EntryKind::File) => {
                        cancel.check()?;
                        let contents =
                            self.fs.read(&child).map_err(|e| fail(&child, e.to_string()))?;
                        let digest = xxhash_rust::xxh3::xxh3_128(&contents).to_le_bytes();
                        files.push((relative_key(root, &child), digest));
                    }
                    Some(EntryKind::Other) | None => {}
                }
            }
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }
}

/// `/`-separated path of `path` relative to `root`.
fn relative_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
