//! Git operations for switching the workspace between revisions
//!
//! bazel-differ fingerprints both revisions of a comparison in the same working tree, so it
//! needs exactly three things from version control: resolving a user-supplied revision to an
//! immutable commit hash, force-checking out that commit, and returning the tree to where
//! the user left it. Like the rest of the crate, this module drives the system `git` binary
//! through [`GitCommand`] rather than an embedded library, so repository configuration,
//! hooks, sparse checkouts and LFS filters behave exactly as they do for the user.
//!
//! # Example
//!
//! ```rust,no_run
//! use bazel_differ::git::GitRepo;
//! use bazel_differ::vcs::Vcs;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let repo = GitRepo::new("/path/to/workspace");
//! let original = repo.current_revision().await?;
//! let base = repo.resolve("origin/main").await?;
//! repo.checkout(&base).await?;
//! // ... fingerprint ...
//! repo.checkout(&original).await?;
//! # Ok(())
//! # }
//! ```

pub mod command_builder;

pub use command_builder::GitCommand;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::core::DifferError;
use crate::vcs::Vcs;

/// A Git working tree on disk.
#[derive(Debug, Clone)]
pub struct GitRepo {
    path: PathBuf,
}

impl GitRepo {
    /// Wraps the repository at `path` without checking that it exists.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if the directory looks like a Git working tree.
    #[must_use]
    pub fn is_git_repo(&self) -> bool {
        is_valid_git_repo(&self.path)
    }

    /// Full hash of `HEAD`.
    pub async fn get_current_commit(&self) -> Result<String> {
        GitCommand::current_commit()
            .current_dir(&self.path)
            .execute_stdout()
            .await
            .context("Failed to get current commit")
    }

    /// Name of the checked-out branch, or `None` on a detached `HEAD`.
    pub async fn get_current_branch(&self) -> Result<Option<String>> {
        let branch = GitCommand::current_branch()
            .current_dir(&self.path)
            .execute_stdout()
            .await
            .context("Failed to get current branch")?;
        Ok((!branch.is_empty()).then_some(branch))
    }

    /// Returns `true` if tracked files have uncommitted modifications.
    pub async fn has_local_changes(&self) -> Result<bool> {
        let status = GitCommand::status_tracked()
            .current_dir(&self.path)
            .execute_stdout()
            .await
            .context("Failed to read working tree status")?;
        Ok(!status.is_empty())
    }
}

impl Vcs for GitRepo {
    async fn resolve(&self, revision: &str) -> Result<String> {
        GitCommand::verify_commit(revision)
            .current_dir(&self.path)
            .execute_stdout()
            .await
            .map_err(|e| {
                DifferError::GitCheckoutFailed {
                    reference: revision.to_string(),
                    reason: format!("revision does not name a commit ({e})"),
                }
                .into()
            })
    }

    async fn checkout(&self, revision: &str) -> Result<()> {
        if self.has_local_changes().await.unwrap_or(false) {
            tracing::warn!(
                target: "git",
                "Discarding local modifications in {} to check out {}",
                self.path.display(),
                revision
            );
        }

        GitCommand::checkout(revision)
            .current_dir(&self.path)
            .with_context(revision)
            .execute_success()
            .await?;

        tracing::info!(target: "git", "Checked out {}", revision);
        Ok(())
    }

    async fn current_revision(&self) -> Result<String> {
        match self.get_current_branch().await? {
            Some(branch) => Ok(branch),
            None => self.get_current_commit().await,
        }
    }
}

/// Checks whether the system `git` binary can be executed.
#[must_use]
pub fn is_git_installed() -> bool {
    std::process::Command::new(crate::utils::platform::get_git_command())
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Fails with [`DifferError::GitNotFound`] if `git` is unavailable.
pub fn ensure_git_available() -> Result<()> {
    if !is_git_installed() {
        return Err(DifferError::GitNotFound.into());
    }
    Ok(())
}

/// Checks for a `.git` entry (directory, or file for worktrees and submodules).
#[must_use]
pub fn is_valid_git_repo(path: &Path) -> bool {
    path.join(".git").exists()
}
