//! `generate-hashes`: fingerprint the working tree as it is checked out now.
//!
//! Unlike `get-targets` this never touches version control or the cache, so it can run in
//! any checkout, including one with uncommitted changes.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::CommandContext;
use crate::bazel::GraphSource;

#[derive(Args, Debug)]
pub struct GenerateHashesCommand {
    /// File to write the hashes to, as a JSON object of label to fingerprint
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// File listing paths folded into every target's fingerprint
    #[arg(long, value_name = "FILE")]
    seed_filepaths: Option<PathBuf>,
}

impl GenerateHashesCommand {
    pub async fn execute(self, mut ctx: CommandContext) -> Result<()> {
        if let Some(seeds) = self.seed_filepaths {
            ctx.config.seed_filepaths = Some(seeds);
        }

        let fingerprinter = ctx.fingerprinter();
        let graph = ctx.bazel()?.build_graph().await?;
        let map = fingerprinter.fingerprint(&graph, &ctx.cancel).await?;

        crate::output::write_hashes(&self.output, &map)?;
        tracing::info!("Wrote {} hashes to {}", map.len(), self.output.display());

        if ctx.verbose {
            eprintln!("{} Hashed {} targets", "✓".green(), map.len());
        }
        Ok(())
    }
}
