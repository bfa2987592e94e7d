//! Configuration for bazel-differ runs
//!
//! Settings come from four layers, highest precedence first:
//!
//! 1. Command-line flags (applied by the CLI on top of the loaded value)
//! 2. Environment: `BAZEL_DIFFER_CACHE_DIR` overrides the cache directory
//! 3. A TOML file: `--config <path>`, or `.bazel-differ.toml` in the workspace root
//! 4. Built-in defaults
//!
//! # File Format
//!
//! ```toml
//! bazel_path = "/usr/local/bin/bazelisk"
//! bazel_startup_options = ["--output_base=/tmp/differ-ob"]
//! bazel_command_options = ["--noshow_progress"]
//! cache_dir = "~/.cache/bazel-differ"
//! cache_enabled = true
//! seed_filepaths = "tools/ci/seeds.txt"
//! query = 'kind(".*_test", set({{ targets }}))'
//! max_parallel = 16
//! timeout_secs = 1800
//! ```
//!
//! Every key is optional. Unknown keys are rejected so that typos do not silently fall back
//! to defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cache::HashCache;
use crate::constants::{
    CACHE_DIR_ENV, CACHE_DIR_NAME, CONFIG_FILE_NAME, FALLBACK_CORE_COUNT, MIN_PARALLELISM,
    PARALLELISM_CORE_MULTIPLIER,
};
use crate::core::DifferError;

/// Default fingerprinting parallelism: `max(10, 2 × CPU cores)`.
#[must_use]
pub fn default_max_parallel() -> usize {
    let cores = std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(FALLBACK_CORE_COUNT);
    std::cmp::max(MIN_PARALLELISM, cores * PARALLELISM_CORE_MULTIPLIER)
}

fn default_bazel_path() -> PathBuf {
    PathBuf::from(crate::utils::get_bazel_command())
}

const fn default_cache_enabled() -> bool {
    true
}

/// Resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DifferConfig {
    /// Bazel binary, as a path or a name looked up on `PATH`
    #[serde(default = "default_bazel_path")]
    pub bazel_path: PathBuf,

    /// Options placed before the Bazel command
    #[serde(default)]
    pub bazel_startup_options: Vec<String>,

    /// Options placed after the Bazel command
    #[serde(default)]
    pub bazel_command_options: Vec<String>,

    /// Cache root; `None` means the platform cache directory
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,

    /// File listing seed paths, one per line
    #[serde(default)]
    pub seed_filepaths: Option<PathBuf>,

    /// Refinement query template; empty disables refinement
    #[serde(default)]
    pub query: String,

    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Deadline for a whole run, in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for DifferConfig {
    fn default() -> Self {
        Self {
            bazel_path: default_bazel_path(),
            bazel_startup_options: Vec::new(),
            bazel_command_options: Vec::new(),
            cache_dir: None,
            cache_enabled: default_cache_enabled(),
            seed_filepaths: None,
            query: String::new(),
            max_parallel: default_max_parallel(),
            timeout_secs: None,
        }
    }
}

impl DifferConfig {
    /// Loads the configuration file layer.
    ///
    /// An explicit `config_path` must exist. Without one, `<workspace>/.bazel-differ.toml`
    /// is used when present, and defaults otherwise.
    ///
    /// # Errors
    ///
    /// - [`DifferError::ConfigError`] if an explicit config file does not exist
    /// - [`DifferError::ConfigParseError`] if the file is not valid TOML for this schema
    pub async fn load(workspace: &Path, config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(DifferError::ConfigError {
                        message: format!("Config file not found: {}", path.display()),
                    }
                    .into());
                }
                path.to_path_buf()
            }
            None => {
                let candidate = workspace.join(CONFIG_FILE_NAME);
                if !candidate.exists() {
                    tracing::debug!("No {} in {}, using defaults", CONFIG_FILE_NAME, workspace.display());
                    return Ok(Self::default());
                }
                candidate
            }
        };

        Self::load_from(&path).await
    }

    /// Parses a config file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| DifferError::ConfigError {
            message: format!("Failed to read config file {}: {e}", path.display()),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| DifferError::ConfigParseError {
            file: path.display().to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Applies environment overrides using `lookup` (normally `std::env::var`).
    #[must_use]
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup(CACHE_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            tracing::debug!("Cache directory overridden by {}", CACHE_DIR_ENV);
            self.cache_dir = Some(PathBuf::from(dir));
        }
        self
    }

    /// Applies overrides from the process environment.
    #[must_use]
    pub fn with_process_env(self) -> Self {
        self.with_env(|key| std::env::var(key).ok())
    }

    /// Checks invariants that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.max_parallel == 0 {
            return Err(DifferError::ConfigError {
                message: "max_parallel must be at least 1".to_string(),
            }
            .into());
        }
        if self.timeout_secs == Some(0) {
            return Err(DifferError::ConfigError {
                message: "timeout_secs must be greater than zero".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Cache root with `~` and environment variables expanded.
    pub fn resolved_cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => crate::utils::resolve_path(&dir.to_string_lossy()),
            None => dirs::cache_dir().map(|dir| dir.join(CACHE_DIR_NAME)).ok_or_else(|| {
                DifferError::ConfigError {
                    message: format!(
                        "Could not determine a cache directory. Set {CACHE_DIR_ENV} or pass --cache-dir"
                    ),
                }
                .into()
            }),
        }
    }

    /// Builds the fingerprint cache this configuration describes.
    pub fn hash_cache(&self) -> Result<HashCache> {
        if !self.cache_enabled {
            return Ok(HashCache::Disabled);
        }
        Ok(HashCache::directory(self.resolved_cache_dir()?))
    }

    /// Seed file list path, resolved against `workspace` when relative.
    #[must_use]
    pub fn seed_file(&self, workspace: &Path) -> Option<PathBuf> {
        self.seed_filepaths.as_ref().map(|p| if p.is_relative() { workspace.join(p) } else { p.clone() })
    }
}
