//! Reading and writing the files bazel-differ exchanges with CI scripts.
//!
//! - Seed file lists: one path per line; blank lines and `#` comments are ignored.
//! - Hash dumps: a JSON object mapping labels to hex fingerprints, as written by
//!   `generate-hashes` and read by `impacted-targets`.
//! - Target lists: impacted labels, one per line, sorted.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::core::DifferError;
use crate::hashing::FingerprintMap;
use crate::impact::ImpactSet;

/// Reads a seed file list.
///
/// # Errors
///
/// Returns [`DifferError::SeedFileUnreadable`] if the list itself cannot be read.
pub fn read_seed_list(path: &Path) -> Result<Vec<PathBuf>, DifferError> {
    let content = std::fs::read_to_string(path).map_err(|e| DifferError::SeedFileUnreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(PathBuf::from)
        .collect())
}

/// Writes a fingerprint map as pretty-printed JSON.
pub fn write_hashes(path: &Path, map: &FingerprintMap) -> Result<()> {
    let mut json = serde_json::to_vec_pretty(map).context("Failed to serialize fingerprints")?;
    json.push(b'\n');
    crate::utils::atomic_write(path, &json)
        .with_context(|| format!("Failed to write hashes to {}", path.display()))
}

/// Reads a fingerprint map written by [`write_hashes`].
pub fn read_hashes(path: &Path) -> Result<FingerprintMap> {
    let content = std::fs::read(path)
        .with_context(|| format!("Failed to read hashes from {}", path.display()))?;
    serde_json::from_slice(&content)
        .with_context(|| format!("Invalid hashes file {}", path.display()))
}

/// Renders labels one per line with a trailing newline; empty for an empty set.
#[must_use]
pub fn format_targets(targets: &ImpactSet) -> String {
    let mut out = String::new();
    for label in targets {
        out.push_str(label);
        out.push('\n');
    }
    out
}

/// Writes the impacted targets file.
///
/// Returns `false` without touching the file when `targets` is empty and
/// `output_on_empty` is off.
pub fn write_targets(path: &Path, targets: &ImpactSet, output_on_empty: bool) -> Result<bool> {
    if targets.is_empty() && !output_on_empty {
        tracing::debug!("No impacted targets, not writing {}", path.display());
        return Ok(false);
    }
    crate::utils::atomic_write(path, format_targets(targets).as_bytes())
        .with_context(|| format!("Failed to write targets to {}", path.display()))?;
    Ok(true)
}
