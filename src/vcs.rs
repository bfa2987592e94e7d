//! Version-control abstraction used by the impact pipeline.
//!
//! The pipeline only needs to pin revisions to immutable identifiers, switch the shared
//! working tree between them, and put it back afterwards. [`GitRepo`](crate::git::GitRepo) is
//! the production implementation; tests substitute in-memory fakes.

use anyhow::Result;

/// Operations on the working tree's version control system.
#[allow(async_fn_in_trait)]
pub trait Vcs {
    /// Resolves `revision` (branch, tag, relative ref or hash) to a full commit hash.
    async fn resolve(&self, revision: &str) -> Result<String>;

    /// Makes the working tree match `revision`.
    async fn checkout(&self, revision: &str) -> Result<()>;

    /// Returns a revision that restores the current checkout: the branch name when on a
    /// branch, otherwise the commit hash.
    async fn current_revision(&self) -> Result<String>;
}
