//! Common test utilities for bazel-differ integration tests
//!
//! [`TestWorkspace`] is a scratch Git repository laid out like a tiny Bazel workspace, plus a
//! fake `bazel` script. The script answers graph queries with the `bazel-query.jsonl` file
//! committed in the workspace and label queries with `bazel-labels.txt`, and appends every
//! invocation to a log outside the repository.

// Not every helper is used by every test module
#![allow(dead_code)]

use anyhow::{Context, Result};
use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use bazel_differ::test_utils::TestGit;

/// Streamed query output for a workspace with a binary, a library and a genrule.
pub const QUERY_OUTPUT: &str = concat!(
    r#"{"type":"RULE","rule":{"name":"//app:bin","ruleClass":"sh_binary","attribute":[{"name":"srcs","type":"LABEL_LIST","stringListValue":["//app:main.sh"]}],"ruleInput":["//app:main.sh","//lib:lib"]}}"#,
    "\n",
    r#"{"type":"SOURCE_FILE","sourceFile":{"name":"//app:main.sh","location":"/ws/app/BUILD:1:1"}}"#,
    "\n",
    r#"{"type":"RULE","rule":{"name":"//lib:lib","ruleClass":"sh_library","attribute":[],"ruleInput":["//lib:lib.sh","@bash//:bin"]}}"#,
    "\n",
    r#"{"type":"SOURCE_FILE","sourceFile":{"name":"//lib:lib.sh","location":"/ws/lib/BUILD:1:1"}}"#,
    "\n",
    r#"{"type":"RULE","rule":{"name":"//docs:site","ruleClass":"genrule","attribute":[],"ruleInput":["//docs:index.md"]}}"#,
    "\n",
    r#"{"type":"SOURCE_FILE","sourceFile":{"name":"//docs:index.md","location":"/ws/docs/BUILD:1:1"}}"#,
    "\n",
);

const FAKE_BAZEL: &str = r#"#!/bin/sh
printf '%s\n' "$*" >> "__LOG__"
for arg in "$@"; do
  case "$arg" in
    --output=streamed_jsonproto) exec cat bazel-query.jsonl ;;
    --output=label) exec cat bazel-labels.txt ;;
  esac
done
echo "unexpected arguments: $*" >&2
exit 2
"#;

/// Git-backed workspace with a fake Bazel.
pub struct TestWorkspace {
    _temp: TempDir,
    root: PathBuf,
    bazel: PathBuf,
    bazel_log: PathBuf,
    cache_dir: PathBuf,
    pub git: TestGit,
}

impl TestWorkspace {
    /// Creates the workspace with an initial commit on `main`.
    pub fn new() -> Result<Self> {
        bazel_differ::test_utils::init_test_logging(None);

        let temp = TempDir::new()?;
        let root = temp.path().join("workspace");
        let bin = temp.path().join("bin");
        fs::create_dir_all(&root)?;
        fs::create_dir_all(&bin)?;

        let bazel_log = temp.path().join("bazel.log");
        let bazel = bin.join("bazel");
        fs::write(&bazel, FAKE_BAZEL.replace("__LOG__", &bazel_log.display().to_string()))?;
        make_executable(&bazel)?;

        let git = TestGit::new(&root);
        git.init()?;

        let workspace = Self {
            cache_dir: temp.path().join("cache"),
            _temp: temp,
            root,
            bazel,
            bazel_log,
            git,
        };
        workspace.write("bazel-query.jsonl", QUERY_OUTPUT)?;
        workspace.write("bazel-labels.txt", "")?;
        workspace.write("app/main.sh", "echo hello\n")?;
        workspace.write("lib/lib.sh", "greet() { echo hi; }\n")?;
        workspace.write("docs/index.md", "# Docs\n")?;
        workspace.commit("Initial workspace")?;
        Ok(workspace)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Writes a file relative to the workspace root, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> Result<()> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn read(&self, relative: &str) -> Result<String> {
        Ok(fs::read_to_string(self.root.join(relative))?)
    }

    pub fn commit(&self, message: &str) -> Result<String> {
        self.git.commit_all(message)
    }

    /// Fake Bazel invocations so far, one argument line per call.
    pub fn bazel_calls(&self) -> Vec<String> {
        fs::read_to_string(&self.bazel_log)
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Number of graph queries the fake Bazel answered.
    pub fn graph_queries(&self) -> usize {
        self.bazel_calls().iter().filter(|call| call.contains("streamed_jsonproto")).count()
    }

    /// The fake `bazel` script.
    pub fn bazel(&self) -> &Path {
        &self.bazel
    }

    /// The `bazel-differ` binary, pointed at this workspace, its fake Bazel and its cache.
    pub fn differ(&self) -> Command {
        let mut cmd = self.differ_without_bazel();
        cmd.arg("--bazel").arg(&self.bazel);
        cmd
    }

    /// Like [`differ`](Self::differ) but leaves `--bazel` to the caller.
    pub fn differ_without_bazel(&self) -> Command {
        let mut cmd = differ_command();
        cmd.arg("--workspace").arg(&self.root).env("BAZEL_DIFFER_CACHE_DIR", &self.cache_dir);
        cmd
    }
}

/// The `bazel-differ` binary with logging left at its defaults.
pub fn differ_command() -> Command {
    let mut cmd = Command::cargo_bin("bazel-differ").expect("bazel-differ binary");
    cmd.env_remove("RUST_LOG");
    cmd
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
