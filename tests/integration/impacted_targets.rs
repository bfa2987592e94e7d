//! Integration tests for `impacted-targets`

use anyhow::Result;
use predicates::prelude::*;
use tempfile::TempDir;

use crate::common::differ_command as differ;

const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
const C: &str = "cccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccc";

fn write_hashes(temp: &TempDir, name: &str, entries: &[(&str, &str)]) -> Result<std::path::PathBuf> {
    let map: serde_json::Map<String, serde_json::Value> =
        entries.iter().map(|(label, hash)| ((*label).to_string(), (*hash).into())).collect();
    let path = temp.path().join(name);
    std::fs::write(&path, serde_json::to_string_pretty(&map)?)?;
    Ok(path)
}

#[test]
fn test_added_and_changed_targets_are_impacted() -> Result<()> {
    let temp = TempDir::new()?;
    let before = write_hashes(&temp, "before.json", &[("//a:a", A), ("//b:b", B), ("//gone:gone", C)])?;
    let after = write_hashes(&temp, "after.json", &[("//a:a", A), ("//b:b", C), ("//c:c", A)])?;

    differ()
        .arg("impacted-targets")
        .arg("--starting-hashes")
        .arg(&before)
        .arg("--final-hashes")
        .arg(&after)
        .assert()
        .success()
        .stdout("//b:b\n//c:c\n");
    Ok(())
}

#[test]
fn test_writes_output_file() -> Result<()> {
    let temp = TempDir::new()?;
    let before = write_hashes(&temp, "before.json", &[("//a:a", A)])?;
    let after = write_hashes(&temp, "after.json", &[("//a:a", B)])?;
    let out = temp.path().join("targets.txt");

    differ()
        .arg("impacted-targets")
        .arg("--startingHashes")
        .arg(&before)
        .arg("--finalHashes")
        .arg(&after)
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stdout("");
    assert_eq!(std::fs::read_to_string(&out)?, "//a:a\n");
    Ok(())
}

#[test]
fn test_removed_targets_only_is_empty() -> Result<()> {
    let temp = TempDir::new()?;
    let before = write_hashes(&temp, "before.json", &[("//a:a", A), ("//b:b", B)])?;
    let after = write_hashes(&temp, "after.json", &[("//a:a", A)])?;

    differ()
        .arg("impacted-targets")
        .arg("--starting-hashes")
        .arg(&before)
        .arg("--final-hashes")
        .arg(&after)
        .assert()
        .success()
        .stdout("");
    Ok(())
}

#[test]
fn test_invalid_hash_file() -> Result<()> {
    let temp = TempDir::new()?;
    let before = write_hashes(&temp, "before.json", &[("//a:a", "not-hex")])?;
    let after = write_hashes(&temp, "after.json", &[("//a:a", A)])?;

    differ()
        .arg("impacted-targets")
        .arg("--starting-hashes")
        .arg(&before)
        .arg("--final-hashes")
        .arg(&after)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("before.json"));
    Ok(())
}
