//! Test utilities for bazel-differ
//!
//! Helpers shared by unit tests and the integration suite:
//!
//! - [`init_test_logging`] wires `tracing` output into the test harness
//! - [`TestGit`] builds scratch Git repositories with the system `git`
//! - [`fakes`] provides in-memory implementations of the pipeline's collaborators
//!
//! # Example
//!
//! ```rust,no_run
//! use bazel_differ::test_utils::{FakeVcs, init_test_logging};
//!
//! init_test_logging(None);
//! let vcs = FakeVcs::new("main").with_revision("main", "c1");
//! ```

pub mod fakes;
pub mod git_helper;

pub use fakes::{FakeVcs, RecordingRefiner, StaticGraphSource};
pub use git_helper::TestGit;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::graph::{BuildGraph, SourceRef, Target};

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. With `level` set, that level is used; otherwise
/// `RUST_LOG` is honoured, and without either nothing is logged.
///
/// ```bash
/// RUST_LOG=hashing=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .try_init();
    });
}

/// `//app:app -> //lib:lib -> //lib:lib.rs`, with `//tools:gen` standing alone.
///
/// `lib_digest` is the caller digest of the `//lib:lib.rs` source file, so two graphs built
/// with different values differ only below `//lib:lib`.
#[must_use]
pub fn sample_graph(lib_digest: &str) -> BuildGraph {
    let targets = vec![
        Target::new("//lib:lib.rs")
            .with_source(SourceRef::with_digest("//lib:lib.rs", lib_digest.as_bytes())),
        Target::new("//lib:lib")
            .with_attributes(r#"{"rule_class":"rust_library"}"#)
            .with_dep("//lib:lib.rs"),
        Target::new("//app:app")
            .with_attributes(r#"{"rule_class":"rust_binary"}"#)
            .with_dep("//lib:lib"),
        Target::new("//tools:gen").with_attributes(r#"{"rule_class":"genrule"}"#),
    ];

    match BuildGraph::from_targets(targets) {
        Ok(graph) => graph,
        Err(e) => panic!("sample graph is invalid: {e}"),
    }
}
