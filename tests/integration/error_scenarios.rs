//! Integration tests for failures surfaced to the user

use anyhow::Result;
use predicates::prelude::*;

use crate::common::{TestWorkspace, differ_command};

#[test]
fn test_missing_bazel_binary() -> Result<()> {
    let ws = TestWorkspace::new()?;

    ws.differ_without_bazel()
        .args(["--bazel", "/nonexistent/bazel", "generate-hashes", "out.json"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Bazel executable not found"));
    Ok(())
}

#[test]
fn test_unknown_revision() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let head = ws.git.rev_parse_head()?;

    ws.differ()
        .args(["get-targets", "-s", "no-such-branch", "-f", &head])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no-such-branch"));
    assert_eq!(ws.git.get_current_branch()?, "main");
    Ok(())
}

#[test]
fn test_dependency_cycle_is_reported() -> Result<()> {
    let ws = TestWorkspace::new()?;
    ws.write(
        "bazel-query.jsonl",
        concat!(
            r#"{"type":"RULE","rule":{"name":"//a:a","ruleClass":"sh_library","attribute":[],"ruleInput":["//b:b"]}}"#,
            "\n",
            r#"{"type":"RULE","rule":{"name":"//b:b","ruleClass":"sh_library","attribute":[],"ruleInput":["//a:a"]}}"#,
            "\n",
        ),
    )?;

    ws.differ()
        .arg("generate-hashes")
        .arg(ws.path().parent().unwrap().join("out.json"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Circular dependency detected: //a:a -> //b:b -> //a:a"));
    Ok(())
}

#[test]
fn test_not_a_git_repository() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let plain = ws.path().parent().unwrap().join("plain");
    std::fs::create_dir_all(&plain)?;

    differ_command()
        .arg("--workspace")
        .arg(&plain)
        .arg("--bazel")
        .arg(ws.bazel())
        .args(["get-targets", "-s", "a", "-f", "b"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a Git repository"));
    Ok(())
}

#[test]
fn test_invalid_config_file() -> Result<()> {
    let ws = TestWorkspace::new()?;
    ws.write(".bazel-differ.toml", "max_paralel = 4\n")?;

    ws.differ()
        .args(["generate-hashes", "out.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(".bazel-differ.toml"));
    Ok(())
}
