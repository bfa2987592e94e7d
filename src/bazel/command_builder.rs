//! Builder for `bazel` invocations.
//!
//! Mirrors [`GitCommand`](crate::git::GitCommand): arguments are accumulated fluently, the
//! command runs in the workspace directory with captured output, and failures are mapped to
//! [`DifferError`] variants carrying Bazel's stderr.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::DifferError;

/// Builder for a single `bazel` invocation.
///
/// Startup options go before the command (`bazel --output_base=/x query ...`), command
/// options after it.
#[derive(Debug, Clone)]
pub struct BazelCommand {
    program: PathBuf,
    startup_options: Vec<String>,
    command: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    timeout_duration: Option<Duration>,
}

impl BazelCommand {
    /// Starts a `<program> <command>` invocation.
    pub fn new(program: impl Into<PathBuf>, command: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            startup_options: Vec::new(),
            command: command.into(),
            args: Vec::new(),
            current_dir: None,
            timeout_duration: None,
        }
    }

    /// `bazel query <expression>`, without output options.
    pub fn query(program: impl Into<PathBuf>, expression: &str) -> Self {
        Self::new(program, "query").arg(expression)
    }

    pub fn startup_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.startup_options.extend(options.into_iter().map(Into::into));
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Full argument list after the program name.
    #[must_use]
    pub fn full_args(&self) -> Vec<String> {
        let mut args = self.startup_options.clone();
        args.push(self.command.clone());
        args.extend(self.args.iter().cloned());
        args
    }

    /// Runs the command and returns its stdout.
    ///
    /// # Errors
    ///
    /// - [`DifferError::BazelNotFound`] if the program cannot be spawned
    /// - [`DifferError::BazelQueryFailed`] on a non-zero exit or timeout
    pub async fn execute_stdout(self) -> Result<String> {
        let start = std::time::Instant::now();
        let full_args = self.full_args();
        let description = format!("{} {}", self.command, self.args.join(" "));

        let mut cmd = Command::new(&self.program);
        cmd.args(&full_args);
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!(
            target: "bazel",
            "Executing command: {} {}",
            self.program.display(),
            full_args.join(" ")
        );

        let output_future = cmd.output();
        let result = match self.timeout_duration {
            Some(duration) => match timeout(duration, output_future).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        target: "bazel",
                        "Command timed out after {} seconds: bazel {}",
                        duration.as_secs(),
                        description
                    );
                    return Err(DifferError::BazelQueryFailed {
                        query: description,
                        stderr: format!("timed out after {} seconds", duration.as_secs()),
                    }
                    .into());
                }
            },
            None => output_future.await,
        };

        let output = match result {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DifferError::BazelNotFound {
                    path: self.program.display().to_string(),
                }
                .into());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to execute {}", self.program.display()));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            tracing::debug!(target: "bazel", "Command failed with exit code: {:?}", output.status.code());
            return Err(DifferError::BazelQueryFailed {
                query: description,
                stderr,
            }
            .into());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(target: "bazel", "Bazel {} took {:.2}s", self.command, elapsed.as_secs_f64());
        }

        String::from_utf8(output.stdout).context("Bazel produced non-UTF-8 output")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_order() {
        let cmd = BazelCommand::query("bazel", "//...")
            .startup_options(["--output_base=/tmp/ob"])
            .args(["--output=label", "--keep_going"]);

        assert_eq!(
            cmd.full_args(),
            vec!["--output_base=/tmp/ob", "query", "//...", "--output=label", "--keep_going"]
        );
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = BazelCommand::query("/nonexistent/bazel-differ-test/bazel", "//...")
            .execute_stdout()
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DifferError>(),
            Some(DifferError::BazelNotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_carries_stderr() {
        // `sh -c` stands in for bazel: prints to stderr and exits 7
        let err = BazelCommand::new("sh", "-c")
            .arg("echo 'ERROR: no such package' >&2; exit 7")
            .execute_stdout()
            .await
            .unwrap_err();
        match err.downcast_ref::<DifferError>() {
            Some(DifferError::BazelQueryFailed {
                stderr,
                ..
            }) => assert!(stderr.contains("no such package")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
