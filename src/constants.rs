//! Global constants used throughout the bazel-differ codebase.
//!
//! Parallelism defaults, file names, and environment variable names live here so they are
//! discoverable in one place.

/// Minimum default parallelism for fingerprinting.
///
/// Source digesting is I/O-bound, so even single-core machines benefit from several
/// concurrent reads.
pub const MIN_PARALLELISM: usize = 10;

/// Multiplier applied to CPU core count for default parallelism.
pub const PARALLELISM_CORE_MULTIPLIER: usize = 2;

/// Default CPU core count when detection fails.
///
/// Used as a fallback when `std::thread::available_parallelism()` returns an error.
pub const FALLBACK_CORE_COUNT: usize = 4;

/// Per-workspace configuration file, looked up in the workspace root.
pub const CONFIG_FILE_NAME: &str = ".bazel-differ.toml";

/// Environment variable overriding the cache directory.
pub const CACHE_DIR_ENV: &str = "BAZEL_DIFFER_CACHE_DIR";

/// Subdirectory of the platform cache directory used by default.
pub const CACHE_DIR_NAME: &str = "bazel-differ";
