//! Command-line interface for bazel-differ.
//!
//! # Available Commands
//!
//! - `get-targets` - Targets impacted between two revisions of the workspace
//! - `generate-hashes` - Fingerprint the current working tree and write the map as JSON
//! - `impacted-targets` - Diff two hash files written by `generate-hashes`
//!
//! # Usage
//!
//! ```bash
//! # Impacted targets of a pull request, narrowed to tests
//! bazel-differ get-targets -s origin/main -f HEAD \
//!     --query 'kind(".*_test", set({{ targets }}))' -o targets.txt
//!
//! # The same in two steps, e.g. across CI jobs
//! git checkout origin/main && bazel-differ generate-hashes before.json
//! git checkout HEAD && bazel-differ generate-hashes after.json
//! bazel-differ impacted-targets --starting-hashes before.json --final-hashes after.json
//! ```
//!
//! # Configuration
//!
//! Global flags override `BAZEL_DIFFER_CACHE_DIR`, which overrides the configuration file
//! (`.bazel-differ.toml` in the workspace, or `--config`). See [`crate::config`].

pub mod common;
mod generate_hashes;
mod get_targets;
mod impacted_targets;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::DifferConfig;
use crate::core::CancellationToken;
pub use common::CommandContext;

/// Main CLI structure for bazel-differ.
#[derive(Parser, Debug)]
#[command(
    name = "bazel-differ",
    about = "Find the Bazel targets impacted by a range of commits",
    version,
    long_about = "bazel-differ fingerprints every target of a Bazel workspace at two revisions \
                  and reports the targets whose fingerprints differ, so CI only builds and \
                  tests what a change can affect."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Flags accepted by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalOptions {
    /// Bazel workspace root (defaults to the current directory)
    #[arg(short, long, global = true, value_name = "DIR")]
    workspace: Option<PathBuf>,

    /// Bazel binary to run
    #[arg(short, long, global = true, value_name = "PATH")]
    bazel: Option<PathBuf>,

    /// Configuration file (defaults to `.bazel-differ.toml` in the workspace)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging and echo results to stdout
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors (`-q` belongs to `get-targets --query`)
    #[arg(long, global = true)]
    quiet: bool,

    /// Maximum number of targets fingerprinted concurrently
    #[arg(long, global = true, value_name = "N")]
    max_parallel: Option<usize>,

    /// Abort the run after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute the targets impacted between two revisions
    GetTargets(get_targets::GetTargetsCommand),

    /// Fingerprint the current working tree and write the hashes as JSON
    GenerateHashes(generate_hashes::GenerateHashesCommand),

    /// Diff two hash files written by `generate-hashes`
    ImpactedTargets(impacted_targets::ImpactedTargetsCommand),
}

impl Cli {
    /// Log filter implied by `--verbose` / `--quiet`, used when `RUST_LOG` is unset.
    #[must_use]
    pub fn log_directive(&self) -> &'static str {
        if self.global.verbose {
            "bazel_differ=debug,git=debug,bazel=debug,cache=debug,hashing=debug,pipeline=debug"
        } else if self.global.quiet {
            "error"
        } else {
            "warn"
        }
    }

    pub async fn execute(self, cancel: CancellationToken) -> Result<()> {
        match self.command {
            // Works on hash files alone; no workspace or configuration needed.
            Commands::ImpactedTargets(cmd) => cmd.execute(self.global.verbose).await,
            Commands::GetTargets(cmd) => cmd.execute(self.global.context(cancel).await?).await,
            Commands::GenerateHashes(cmd) => cmd.execute(self.global.context(cancel).await?).await,
        }
    }
}

impl GlobalOptions {
    /// Resolves the workspace and configuration into a [`CommandContext`].
    pub async fn context(&self, cancel: CancellationToken) -> Result<CommandContext> {
        let workspace = common::resolve_workspace(self.workspace.as_deref())?;
        let config = self.build_config(&workspace).await?;
        Ok(CommandContext::new(workspace, config, cancel, self.verbose))
    }

    /// Loads the configuration layers and applies global flags on top.
    pub async fn build_config(&self, workspace: &Path) -> Result<DifferConfig> {
        let mut config = DifferConfig::load(workspace, self.config.as_deref()).await?.with_process_env();

        if let Some(bazel) = &self.bazel {
            config.bazel_path.clone_from(bazel);
        }
        if let Some(max_parallel) = self.max_parallel {
            config.max_parallel = max_parallel;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = Some(timeout);
        }

        config.validate()?;
        Ok(config)
    }
}
