//! `impacted-targets`: diff two hash files written by `generate-hashes`.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::impact::ImpactAnalyzer;
use crate::output;

#[derive(Args, Debug)]
pub struct ImpactedTargetsCommand {
    /// Hashes of the starting revision
    #[arg(long = "starting-hashes", alias = "startingHashes", value_name = "FILE")]
    starting_hashes: PathBuf,

    /// Hashes of the final revision
    #[arg(long = "final-hashes", alias = "finalHashes", value_name = "FILE")]
    final_hashes: PathBuf,

    /// File to write the impacted targets to; stdout when absent
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

impl ImpactedTargetsCommand {
    pub async fn execute(self, verbose: bool) -> Result<()> {
        let before = output::read_hashes(&self.starting_hashes)?;
        let after = output::read_hashes(&self.final_hashes)?;

        let impacted = ImpactAnalyzer::diff(&before, &after);
        tracing::info!("{}", ImpactAnalyzer::summarize(&before, &after));

        match &self.output {
            Some(path) => {
                output::write_targets(path, &impacted, true)?;
                if verbose {
                    print!("{}", output::format_targets(&impacted));
                }
            }
            None => print!("{}", output::format_targets(&impacted)),
        }
        Ok(())
    }
}
