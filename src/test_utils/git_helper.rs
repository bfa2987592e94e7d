//! Git test helper utilities
//!
//! Drives the system `git` synchronously to build small repositories for tests.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

/// A scratch Git repository.
pub struct TestGit {
    repo_path: PathBuf,
}

impl TestGit {
    fn run_git_command(&self, args: &[&str], action: &str) -> Result<std::process::Output> {
        let output = Command::new(crate::utils::get_git_command())
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .with_context(|| action.to_string())?;

        if !output.status.success() {
            bail!("{} failed: {}", action, String::from_utf8_lossy(&output.stderr));
        }

        Ok(output)
    }

    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    /// Initializes the repository on branch `main` with a test identity.
    pub fn init(&self) -> Result<()> {
        self.run_git_command(&["init", "--quiet"], "Failed to initialize git repository")?;
        self.set_head("main")?;
        self.config_user()
    }

    pub fn config_user(&self) -> Result<()> {
        self.run_git_command(
            &["config", "user.email", "test@bazel-differ.example"],
            "Failed to configure git user email",
        )?;
        self.run_git_command(&["config", "user.name", "Test User"], "Failed to configure git user name")?;
        self.run_git_command(&["config", "commit.gpgsign", "false"], "Failed to disable signing")?;
        Ok(())
    }

    /// Stages everything and commits, returning the new commit hash.
    pub fn commit_all(&self, message: &str) -> Result<String> {
        self.run_git_command(&["add", "--all"], "Failed to add files to git")?;
        self.run_git_command(&["commit", "--quiet", "-m", message], "Failed to create git commit")?;
        self.rev_parse_head()
    }

    pub fn tag(&self, tag_name: &str) -> Result<()> {
        self.run_git_command(&["tag", tag_name], &format!("Failed to create tag: {tag_name}"))?;
        Ok(())
    }

    pub fn checkout(&self, ref_name: &str) -> Result<()> {
        self.run_git_command(&["checkout", "--quiet", ref_name], &format!("Failed to checkout: {ref_name}"))?;
        Ok(())
    }

    pub fn rev_parse_head(&self) -> Result<String> {
        let output = self.run_git_command(&["rev-parse", "HEAD"], "Failed to get current commit SHA")?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn get_current_branch(&self) -> Result<String> {
        let output =
            self.run_git_command(&["branch", "--show-current"], "Failed to get current branch name")?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn set_head(&self, branch_name: &str) -> Result<()> {
        self.run_git_command(
            &["symbolic-ref", "HEAD", &format!("refs/heads/{branch_name}")],
            &format!("Failed to set HEAD to branch: {branch_name}"),
        )?;
        Ok(())
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }
}
