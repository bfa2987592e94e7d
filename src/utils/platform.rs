//! Platform helpers for locating external tools and expanding user paths.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Checks if the current platform is Windows.
#[must_use]
pub const fn is_windows() -> bool {
    cfg!(windows)
}

/// Returns the platform-specific git executable name.
#[must_use]
pub const fn get_git_command() -> &'static str {
    if is_windows() {
        "git.exe"
    } else {
        "git"
    }
}

/// Returns the default Bazel launcher name.
///
/// `bazel` is usually a bazelisk shim on developer machines, which is what we want.
#[must_use]
pub const fn get_bazel_command() -> &'static str {
    if is_windows() {
        "bazel.exe"
    } else {
        "bazel"
    }
}

/// Locates an executable, either as an explicit path or by searching `PATH`.
///
/// Returns `None` if the program cannot be found.
#[must_use]
pub fn find_executable(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return program.is_file().then(|| program.to_path_buf());
    }
    which::which(program).ok()
}

/// Expands `~` and environment variables in a user-supplied path.
///
/// # Errors
///
/// Returns an error if the path references an undefined environment variable or the home
/// directory cannot be determined.
pub fn resolve_path(path: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(path).with_context(|| {
        format!(
            "Failed to expand path: {path}\n\n\
            Check that every referenced environment variable is set (use $VAR or ${{VAR}})"
        )
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}
