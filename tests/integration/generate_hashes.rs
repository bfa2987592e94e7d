//! Integration tests for `generate-hashes` and its pairing with `impacted-targets`

use anyhow::Result;
use predicates::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

use crate::common::TestWorkspace;

fn read_map(path: &Path) -> Result<BTreeMap<String, String>> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

#[test]
fn test_writes_every_target() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let out = ws.path().parent().unwrap().join("hashes.json");

    ws.differ().arg("generate-hashes").arg(&out).assert().success();

    let map = read_map(&out)?;
    let labels: Vec<_> = map.keys().map(String::as_str).collect();
    assert_eq!(
        labels,
        vec!["//app:bin", "//app:main.sh", "//docs:index.md", "//docs:site", "//lib:lib", "//lib:lib.sh"]
    );
    assert!(map.values().all(|hash| hash.len() == 64 && hash.chars().all(|c| c.is_ascii_hexdigit())));
    Ok(())
}

#[test]
fn test_hashes_are_deterministic() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let dir = ws.path().parent().unwrap();

    ws.differ().arg("generate-hashes").arg(dir.join("a.json")).assert().success();
    ws.differ()
        .args(["--max-parallel", "1", "generate-hashes"])
        .arg(dir.join("b.json"))
        .assert()
        .success();

    assert_eq!(read_map(&dir.join("a.json"))?, read_map(&dir.join("b.json"))?);
    Ok(())
}

#[test]
fn test_uncommitted_changes_are_hashed() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let dir = ws.path().parent().unwrap();

    ws.differ().arg("generate-hashes").arg(dir.join("before.json")).assert().success();
    ws.write("app/main.sh", "echo goodbye\n")?;
    ws.differ().arg("generate-hashes").arg(dir.join("after.json")).assert().success();

    ws.differ()
        .arg("impacted-targets")
        .arg("--starting-hashes")
        .arg(dir.join("before.json"))
        .arg("--final-hashes")
        .arg(dir.join("after.json"))
        .assert()
        .success()
        .stdout("//app:bin\n//app:main.sh\n");
    Ok(())
}

#[test]
fn test_seed_file_change_changes_every_hash() -> Result<()> {
    let ws = TestWorkspace::new()?;
    let dir = ws.path().parent().unwrap();
    ws.write("tools/seeds.txt", "# toolchain inputs\ntools/toolchain.bzl\n")?;
    ws.write("tools/toolchain.bzl", "VERSION = 1\n")?;

    ws.differ()
        .args(["generate-hashes", "--seed-filepaths", "tools/seeds.txt"])
        .arg(dir.join("v1.json"))
        .assert()
        .success();
    ws.write("tools/toolchain.bzl", "VERSION = 2\n")?;
    ws.differ()
        .args(["generate-hashes", "--seed-filepaths", "tools/seeds.txt"])
        .arg(dir.join("v2.json"))
        .assert()
        .success();

    let v1 = read_map(&dir.join("v1.json"))?;
    let v2 = read_map(&dir.join("v2.json"))?;
    assert_eq!(v1.len(), v2.len());
    assert!(v1.iter().all(|(label, hash)| v2[label] != *hash));
    Ok(())
}

#[test]
fn test_missing_seed_path_fails() -> Result<()> {
    let ws = TestWorkspace::new()?;
    ws.write("seeds.txt", "does/not/exist.bzl\n")?;

    ws.differ()
        .args(["generate-hashes", "--seed-filepaths", "seeds.txt"])
        .arg(ws.path().parent().unwrap().join("out.json"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("does/not/exist.bzl"));
    Ok(())
}
