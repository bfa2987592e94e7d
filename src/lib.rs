//! bazel-differ - impacted target detection for Bazel workspaces
//!
//! Given two revisions of a Git repository holding a Bazel workspace, bazel-differ reports
//! which build targets may behave differently between them, so CI only builds and tests
//! those.
//!
//! # Architecture Overview
//!
//! Every target of the build graph gets a content-derived fingerprint that covers:
//! - the rule's own configuration (rule class and attributes)
//! - the contents of the files and directories it reads directly
//! - the fingerprints of everything it depends on
//! - optional seed files that affect the whole workspace (toolchains, `.bazelrc`)
//!
//! Two fingerprint maps are then diffed: a target is impacted if it is new or its fingerprint
//! changed. Fingerprint maps are cached per commit, so the base revision of a busy branch is
//! fingerprinted once.
//!
//! # Core Modules
//!
//! ## Engine
//! - [`graph`] - Build graph model and dependency-order traversal planning
//! - [`hashing`] - Source digests and target fingerprints
//! - [`cache`] - Per-revision fingerprint map storage
//! - [`impact`] - Diffing fingerprint maps into impacted sets
//! - [`pipeline`] - Two-revision comparison tying everything together
//!
//! ## Collaborators
//! - [`vcs`] / [`git`] - Revision resolution and checkout with the system `git`
//! - [`bazel`] - Graph extraction and query refinement with the system `bazel`
//! - [`output`] - Seed lists, hash dumps and target lists on disk
//!
//! ## Supporting Modules
//! - [`cli`] - Command-line interface
//! - [`config`] - `.bazel-differ.toml` and environment configuration
//! - [`core`] - Error types and cancellation
//! - [`constants`] - Defaults shared across modules
//! - [`utils`] - Filesystem and platform helpers
//!
//! # Example
//!
//! ```rust,no_run
//! use bazel_differ::core::CancellationToken;
//! use bazel_differ::graph::{BuildGraph, SourceRef, Target};
//! use bazel_differ::hashing::{FingerprintOptions, TargetFingerprinter};
//! use bazel_differ::impact::ImpactAnalyzer;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let before = BuildGraph::from_targets([
//!     Target::new("//lib:lib").with_source(SourceRef::with_digest("//lib:lib.rs", b"v1".to_vec())),
//!     Target::new("//app:app").with_dep("//lib:lib"),
//! ])?;
//! let after = BuildGraph::from_targets([
//!     Target::new("//lib:lib").with_source(SourceRef::with_digest("//lib:lib.rs", b"v2".to_vec())),
//!     Target::new("//app:app").with_dep("//lib:lib"),
//! ])?;
//!
//! let fingerprinter = TargetFingerprinter::new(FingerprintOptions::default());
//! let cancel = CancellationToken::new();
//! let impacted = ImpactAnalyzer::diff(
//!     &fingerprinter.fingerprint(&before, &cancel).await?,
//!     &fingerprinter.fingerprint(&after, &cancel).await?,
//! );
//! assert_eq!(impacted.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;

pub mod bazel;
pub mod git;
pub mod vcs;

pub mod graph;
pub mod hashing;
pub mod impact;
pub mod output;
pub mod pipeline;

pub mod utils;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
