//! File system helpers for cache entries and command output.
//!
//! Every file bazel-differ produces (cached fingerprint maps, hash dumps, impacted target
//! lists) is written atomically: the content goes to a sibling temporary file which is synced
//! and then renamed over the destination, so readers never observe a partially written file.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Creates a directory and all of its parents if they do not exist.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or if `path` exists but is not a
/// directory.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).with_context(|| {
            format!(
                "Failed to create directory: {}\n\nCheck directory permissions and path validity",
                path.display()
            )
        })?;
    } else if !path.is_dir() {
        return Err(anyhow::anyhow!("Path exists but is not a directory: {}", path.display()));
    }
    Ok(())
}

/// Writes `content` to `path` atomically, creating parent directories as needed.
///
/// The temporary file is `<path>.tmp` in the same directory, so the final rename never
/// crosses a filesystem boundary.
///
/// # Errors
///
/// Returns an error if the parent directory cannot be created, or the temporary file cannot
/// be written, synced or renamed into place.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_dir(parent)?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = Path::new(&temp_name);

    {
        let mut file = fs::File::create(temp_path).with_context(|| {
            format!(
                "Failed to create temp file: {}\n\nCheck file permissions and that directory exists",
                temp_path.display()
            )
        })?;

        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;

        file.sync_all().with_context(|| "Failed to sync file to disk")?;
    }

    fs::rename(temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}
