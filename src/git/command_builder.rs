//! Type-safe Git command builder for consistent command execution
//!
//! This module provides a fluent API for building and executing Git commands, with uniform
//! logging, timeouts, and mapping of failures onto [`DifferError`] variants.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::core::DifferError;
use crate::utils::platform::get_git_command;

/// Builder for a single `git` invocation.
///
/// # Examples
///
/// ```rust,no_run
/// use bazel_differ::git::command_builder::GitCommand;
///
/// # async fn example() -> anyhow::Result<()> {
/// let sha = GitCommand::verify_commit("main")
///     .current_dir("/path/to/workspace")
///     .execute_stdout()
///     .await?;
/// println!("main is at {sha}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct GitCommand {
    /// Arguments after `git` (and after `-C <dir>`)
    args: Vec<String>,

    /// Repository directory, passed with `-C`
    current_dir: Option<PathBuf>,

    /// `None` waits forever
    timeout_duration: Option<Duration>,

    /// Prefix for log lines, e.g. the revision being processed
    context: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            // Checkouts of very large workspaces can be slow
            timeout_duration: Some(Duration::from_secs(300)),
            context: None,
        }
    }
}

impl GitCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the command against the repository at `dir`.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
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

    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Executes the command and captures its output.
    ///
    /// # Errors
    ///
    /// - [`DifferError::GitCheckoutFailed`] if a `checkout` exits non-zero
    /// - [`DifferError::GitCommandError`] for any other non-zero exit or a timeout
    /// - An I/O error if `git` cannot be spawned
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let start = std::time::Instant::now();
        let git_command = get_git_command();
        let mut cmd = Command::new(git_command);

        let mut full_args = Vec::new();
        if let Some(ref dir) = self.current_dir {
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());
        cmd.args(&full_args);

        let operation = self.args.first().cloned().unwrap_or_else(|| "unknown".to_string());

        if let Some(ref ctx) = self.context {
            tracing::debug!(
                target: "git",
                "({}) Executing command: {} {}",
                ctx,
                git_command,
                full_args.join(" ")
            );
        } else {
            tracing::debug!(target: "git", "Executing command: {} {}", git_command, full_args.join(" "));
        }

        // Never block on a credential prompt
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let output_future = cmd.output();
        let output = if let Some(duration) = self.timeout_duration {
            if let Ok(result) = timeout(duration, output_future).await {
                result.with_context(|| format!("Failed to execute git {}", full_args.join(" ")))?
            } else {
                tracing::warn!(
                    target: "git",
                    "Command timed out after {} seconds: git {}",
                    duration.as_secs(),
                    full_args.join(" ")
                );
                return Err(DifferError::GitCommandError {
                    operation,
                    stderr: format!(
                        "Git command timed out after {} seconds. This may indicate:\n\
                        - A lock held by another git process (.git/index.lock)\n\
                        - A hook or credential prompt waiting for input\n\
                        Try running the command manually: git {}",
                        duration.as_secs(),
                        full_args.join(" ")
                    ),
                }
                .into());
            }
        } else {
            output_future
                .await
                .with_context(|| format!("Failed to execute git {}", full_args.join(" ")))?
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);

            tracing::debug!(target: "git", "Command failed with exit code: {:?}", output.status.code());
            if !stderr.is_empty() {
                tracing::debug!(target: "git", "Error: {}", stderr);
            }

            let message = if stderr.is_empty() { stdout.to_string() } else { stderr.to_string() };
            let error = if operation == "checkout" {
                DifferError::GitCheckoutFailed {
                    reference: self.args.last().cloned().unwrap_or_default(),
                    reason: message,
                }
            } else {
                DifferError::GitCommandError {
                    operation,
                    stderr: message,
                }
            };
            return Err(error.into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !stderr.is_empty() {
            if let Some(ref ctx) = self.context {
                tracing::debug!(target: "git", "({}) {}", ctx, stderr.trim());
            } else {
                tracing::debug!(target: "git", "{}", stderr.trim());
            }
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(target: "git::perf", "Git {} took {:.2}s", operation, elapsed.as_secs_f64());
        } else if elapsed.as_millis() > 100 {
            tracing::debug!(target: "git::perf", "Git {} took {}ms", operation, elapsed.as_millis());
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Executes the command and returns its trimmed stdout.
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Executes the command, discarding its output.
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

/// Captured output of a successful git command.
#[derive(Debug)]
pub struct GitCommandOutput {
    pub stdout: String,
    pub stderr: String,
}

// Convenience builders for the operations bazel-differ performs

impl GitCommand {
    /// `git checkout --force <revision>`, discarding local modifications to tracked files.
    pub fn checkout(revision: &str) -> Self {
        Self::new().args(["checkout", "--force", "--quiet", revision])
    }

    /// Resolves a revision to the full hash of the commit it points at.
    pub fn verify_commit(revision: &str) -> Self {
        let commit = format!("{revision}^{{commit}}");
        Self::new().args(["rev-parse", "--verify", "--quiet", commit.as_str()])
    }

    pub fn current_commit() -> Self {
        Self::new().args(["rev-parse", "HEAD"])
    }

    /// Prints the checked-out branch, or nothing on a detached HEAD.
    pub fn current_branch() -> Self {
        Self::new().args(["branch", "--show-current"])
    }

    /// Lists modified tracked files.
    pub fn status_tracked() -> Self {
        Self::new().args(["status", "--porcelain", "--untracked-files=no"])
    }
}
