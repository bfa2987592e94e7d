//! Integration test suite for bazel-differ
//!
//! End-to-end tests that run the `bazel-differ` binary against scratch Git repositories and
//! a fake `bazel` script (see `tests/common`).
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **get_targets**: Two-revision comparison, caching, refinement and output handling
//! - **generate_hashes**: Hash dumps and seed files
//! - **impacted_targets**: Diffing stored hash files
//! - **error_scenarios**: Failures surfaced to the user

#[path = "../common/mod.rs"]
mod common;

#[cfg(unix)]
mod error_scenarios;
#[cfg(unix)]
mod generate_hashes;
#[cfg(unix)]
mod get_targets;
mod impacted_targets;
