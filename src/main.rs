//! bazel-differ CLI entry point
//!
//! Parses arguments, installs logging, and runs the command. Ctrl-C trips the shared
//! cancellation token so a fingerprinting pass stops at the next wave and the original
//! checkout is restored.

use anyhow::Result;
use bazel_differ::cli;
use bazel_differ::core::{CancellationToken, user_friendly_error};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_directive()));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).with_target(false).init();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current step");
            on_interrupt.cancel();
        }
    });

    match cli.execute(cancel).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
