//! `get-targets`: impacted targets between two revisions.
//!
//! Checks out each revision in turn, fingerprints it (or reuses the cached fingerprints for
//! its commit), diffs the two maps and optionally narrows the result with a query. The
//! checkout the user started from is restored afterwards.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use super::CommandContext;
use crate::git::GitRepo;
use crate::pipeline::ImpactPipeline;

#[derive(Args, Debug)]
pub struct GetTargetsCommand {
    /// Starting revision (branch, tag or commit)
    #[arg(short = 's', long = "starting-revision", alias = "startingRevision", value_name = "REV")]
    starting_revision: String,

    /// Final revision (branch, tag or commit)
    #[arg(short = 'f', long = "final-revision", alias = "finalRevision", value_name = "REV")]
    final_revision: String,

    /// Query template narrowing the result; `{{ targets }}` expands to the impacted labels
    #[arg(short, long, value_name = "TEMPLATE")]
    query: Option<String>,

    /// File to write the impacted targets to, one per line
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Write the output file even when no targets are impacted
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set, value_name = "BOOL")]
    output_on_empty: bool,

    /// Directory holding cached fingerprints
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Do not read or write cached fingerprints
    #[arg(long)]
    nocache: bool,

    /// File listing paths folded into every target's fingerprint
    #[arg(long, value_name = "FILE")]
    seed_filepaths: Option<PathBuf>,
}

impl GetTargetsCommand {
    pub async fn execute(self, mut ctx: CommandContext) -> Result<()> {
        if let Some(dir) = self.cache_dir {
            ctx.config.cache_dir = Some(dir);
        }
        if self.nocache {
            ctx.config.cache_enabled = false;
        }
        if let Some(seeds) = self.seed_filepaths {
            ctx.config.seed_filepaths = Some(seeds);
        }
        if let Some(query) = self.query {
            ctx.config.query = query;
        }

        crate::git::ensure_git_available()?;
        let repo = GitRepo::new(&ctx.workspace);
        if !repo.is_git_repo() {
            return Err(crate::core::DifferError::ConfigError {
                message: format!("{} is not a Git repository", ctx.workspace.display()),
            }
            .into());
        }

        let bazel = ctx.bazel()?;
        let pipeline = ImpactPipeline::new(
            repo,
            bazel.clone(),
            bazel,
            ctx.config.hash_cache()?,
            ctx.fingerprinter(),
        )
        .with_query(ctx.config.query.clone());

        let report = pipeline
            .run(&self.starting_revision, &self.final_revision, &ctx.cancel)
            .await?;

        if let Some(path) = &self.output
            && crate::output::write_targets(path, &report.impacted, self.output_on_empty)?
        {
            tracing::info!("Wrote {} targets to {}", report.impacted.len(), path.display());
        }
        if self.output.is_none() || ctx.verbose {
            print!("{}", crate::output::format_targets(&report.impacted));
        }

        if ctx.verbose {
            eprintln!(
                "{} {} impacted ({})",
                "✓".green(),
                report.impacted.len(),
                report.summary
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        cmd: GetTargetsCommand,
    }

    #[test]
    fn test_parse_defaults() {
        let parsed = Harness::try_parse_from(["get-targets", "-s", "main", "-f", "HEAD"]).unwrap();
        assert_eq!(parsed.cmd.starting_revision, "main");
        assert_eq!(parsed.cmd.final_revision, "HEAD");
        assert!(parsed.cmd.output_on_empty);
        assert!(!parsed.cmd.nocache);
        assert!(parsed.cmd.query.is_none());
    }

    #[test]
    fn test_parse_output_on_empty_false() {
        let parsed = Harness::try_parse_from([
            "get-targets",
            "--starting-revision",
            "a",
            "--finalRevision",
            "b",
            "--output-on-empty",
            "false",
            "--nocache",
        ])
        .unwrap();
        assert!(!parsed.cmd.output_on_empty);
        assert!(parsed.cmd.nocache);
    }

    #[test]
    fn test_parse_short_query() {
        let parsed = Harness::try_parse_from([
            "get-targets",
            "-s",
            "main",
            "-f",
            "HEAD",
            "-q",
            "kind(\".*_test\",set({{.Targets}}))",
        ])
        .unwrap();
        assert_eq!(parsed.cmd.query.as_deref(), Some("kind(\".*_test\",set({{.Targets}}))"));
    }

    #[test]
    fn test_revisions_required() {
        assert!(Harness::try_parse_from(["get-targets", "-s", "main"]).is_err());
    }
}
