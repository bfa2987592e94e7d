//! Shared state for command implementations.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bazel::BazelClient;
use crate::config::DifferConfig;
use crate::core::CancellationToken;
use crate::hashing::{FingerprintOptions, TargetFingerprinter};

/// Everything a command needs once global flags and configuration are resolved.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Bazel workspace root, also the Git working tree
    pub workspace: PathBuf,
    /// Configuration after file, environment and global flag layers
    pub config: DifferConfig,
    /// Tripped by Ctrl-C or the configured timeout
    pub cancel: CancellationToken,
    /// `--verbose` was given
    pub verbose: bool,
}

impl CommandContext {
    pub fn new(workspace: PathBuf, config: DifferConfig, cancel: CancellationToken, verbose: bool) -> Self {
        let cancel = match config.timeout_secs {
            Some(secs) => cancel.with_deadline(Duration::from_secs(secs)),
            None => cancel,
        };
        Self {
            workspace,
            config,
            cancel,
            verbose,
        }
    }

    /// Bazel client for the workspace, failing early if the binary is missing.
    pub fn bazel(&self) -> Result<BazelClient> {
        let client = BazelClient::from_config(&self.workspace, &self.config);
        client.ensure_available()?;
        Ok(client)
    }

    /// Fingerprinter resolving labels under the workspace. The configured seed list is read
    /// by each pass, from whatever revision is checked out at that point.
    #[must_use]
    pub fn fingerprinter(&self) -> TargetFingerprinter {
        TargetFingerprinter::new(FingerprintOptions {
            working_dir: Some(self.workspace.clone()),
            seed_paths: Vec::new(),
            seed_list: self.config.seed_file(&self.workspace),
            max_parallel: self.config.max_parallel,
        })
    }
}

/// Resolves the `--workspace` flag, defaulting to the current directory.
pub fn resolve_workspace(flag: Option<&Path>) -> Result<PathBuf> {
    let workspace = match flag {
        Some(path) => crate::utils::resolve_path(&path.to_string_lossy())?,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    if !workspace.is_dir() {
        anyhow::bail!("Workspace directory does not exist: {}", workspace.display());
    }
    Ok(workspace)
}
