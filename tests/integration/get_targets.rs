//! Integration tests for `get-targets`

use anyhow::Result;
use predicates::prelude::*;

use crate::common::TestWorkspace;

/// Workspace with a second commit that edits the library source.
fn workspace_with_lib_change() -> Result<(TestWorkspace, String, String)> {
    let ws = TestWorkspace::new()?;
    let base = ws.git.rev_parse_head()?;
    ws.write("lib/lib.sh", "greet() { echo hello; }\n")?;
    let head = ws.commit("Change greeting")?;
    Ok((ws, base, head))
}

#[test]
fn test_source_change_impacts_dependents() -> Result<()> {
    let (ws, base, head) = workspace_with_lib_change()?;
    let out = ws.path().parent().unwrap().join("targets.txt");

    ws.differ()
        .args(["get-targets", "-s", &base, "-f", &head, "-o"])
        .arg(&out)
        .assert()
        .success()
        .stdout("");

    let targets = std::fs::read_to_string(&out)?;
    assert_eq!(targets, "//app:bin\n//lib:lib\n//lib:lib.sh\n");
    Ok(())
}

#[test]
fn test_prints_to_stdout_without_output_file() -> Result<()> {
    let (ws, base, head) = workspace_with_lib_change()?;

    ws.differ()
        .args(["get-targets", "-s", &base, "-f", &head])
        .assert()
        .success()
        .stdout("//app:bin\n//lib:lib\n//lib:lib.sh\n");
    Ok(())
}

#[test]
fn test_seed_list_read_from_each_revision() -> Result<()> {
    let ws = TestWorkspace::new()?;
    ws.write("a.bzl", "A = 1\n")?;
    ws.write("seeds.txt", "a.bzl\n")?;
    let base = ws.commit("Add seed list")?;
    ws.write("b.bzl", "B = 2\n")?;
    ws.write("seeds.txt", "a.bzl\nb.bzl\n")?;
    let head = ws.commit("Add second seed")?;

    ws.differ()
        .args(["get-targets", "-s", &base, "-f", &head, "--nocache", "--seed-filepaths", "seeds.txt"])
        .assert()
        .success()
        .stdout("//app:bin\n//app:main.sh\n//docs:index.md\n//docs:site\n//lib:lib\n//lib:lib.sh\n");
    Ok(())
}

#[test]
fn test_restores_original_branch() -> Result<()> {
    let (ws, base, head) = workspace_with_lib_change()?;

    ws.differ().args(["get-targets", "-s", &head, "-f", &base]).assert().success();

    assert_eq!(ws.git.get_current_branch()?, "main");
    assert_eq!(ws.git.rev_parse_head()?, head);
    assert_eq!(ws.read("lib/lib.sh")?, "greet() { echo hello; }\n");
    Ok(())
}

#[test]
fn test_branch_names_resolve_to_commits() -> Result<()> {
    let (ws, base, _head) = workspace_with_lib_change()?;
    ws.git.tag("v1")?;

    ws.differ()
        .args(["get-targets", "-s", &base, "-f", "v1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("//lib:lib.sh"));

    let entries = std::fs::read_dir(ws.cache_dir().join("hashes"))?.count();
    assert_eq!(entries, 2);
    assert!(!ws.cache_dir().join("hashes").join("v1.json").exists());
    Ok(())
}

#[test]
fn test_cached_revisions_skip_graph_queries() -> Result<()> {
    let (ws, base, head) = workspace_with_lib_change()?;

    ws.differ().args(["get-targets", "-s", &base, "-f", &head]).assert().success();
    assert_eq!(ws.graph_queries(), 2);

    ws.differ()
        .args(["get-targets", "-s", &base, "-f", &head])
        .assert()
        .success()
        .stdout("//app:bin\n//lib:lib\n//lib:lib.sh\n");
    assert_eq!(ws.graph_queries(), 2);
    Ok(())
}

#[test]
fn test_nocache_always_queries() -> Result<()> {
    let (ws, base, head) = workspace_with_lib_change()?;

    for _ in 0..2 {
        ws.differ().args(["get-targets", "--nocache", "-s", &base, "-f", &head]).assert().success();
    }
    assert_eq!(ws.graph_queries(), 4);
    assert!(!ws.cache_dir().exists());
    Ok(())
}

#[test]
fn test_unrelated_change_impacts_nothing_else() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let base = ws.git.rev_parse_head()?;
    ws.write("docs/index.md", "# Documentation\n")?;
    let head = ws.commit("Docs")?;

    ws.differ()
        .args(["get-targets", "-s", &base, "-f", &head])
        .assert()
        .success()
        .stdout("//docs:index.md\n//docs:site\n");
    Ok(())
}

#[test]
fn test_empty_result_without_output_on_empty() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let base = ws.git.rev_parse_head()?;
    ws.write("README.md", "not part of any target\n")?;
    let head = ws.commit("Readme")?;
    let out = ws.path().parent().unwrap().join("targets.txt");

    ws.differ()
        .args(["get-targets", "-s", &base, "-f", &head, "--output-on-empty", "false", "-o"])
        .arg(&out)
        .assert()
        .success();
    assert!(!out.exists());

    ws.differ()
        .args(["get-targets", "-s", &base, "-f", &head, "-o"])
        .arg(&out)
        .assert()
        .success();
    assert_eq!(std::fs::read_to_string(&out)?, "");
    Ok(())
}

#[test]
fn test_query_refines_impacted_targets() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let base = ws.git.rev_parse_head()?;
    ws.write("lib/lib.sh", "greet() { echo hello; }\n")?;
    ws.write("bazel-labels.txt", "//app:bin\n")?;
    let head = ws.commit("Change greeting")?;

    ws.differ()
        .args(["get-targets", "-s", &base, "-f", &head, "--query", "kind(sh_binary, set({{.Targets}}))"])
        .assert()
        .success()
        .stdout("//app:bin\n");

    let calls = ws.bazel_calls();
    let refinement = calls.iter().find(|call| call.contains("--output=label")).unwrap();
    assert!(refinement.contains("kind(sh_binary, set(//app:bin //lib:lib //lib:lib.sh))"));
    Ok(())
}

#[test]
fn test_query_from_config_file() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let base = ws.git.rev_parse_head()?;
    ws.write(".bazel-differ.toml", "query = \"kind(sh_binary, set({{ targets }}))\"\n")?;
    ws.write("lib/lib.sh", "greet() { echo hello; }\n")?;
    ws.write("bazel-labels.txt", "//app:bin\n")?;
    let head = ws.commit("Configure refinement")?;

    ws.differ()
        .args(["get-targets", "-s", &base, "-f", &head])
        .assert()
        .success()
        .stdout("//app:bin\n");
    Ok(())
}
