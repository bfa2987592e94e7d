//! Conversion of `bazel query` output into a [`BuildGraph`].
//!
//! Graph extraction uses `--output=streamed_jsonproto`, which prints one JSON-encoded
//! `Target` message per line:
//!
//! ```text
//! {"type":"RULE","rule":{"name":"//app:bin","ruleClass":"go_binary","attribute":[...],"ruleInput":["//lib:lib","//app:main.go"]}}
//! {"type":"SOURCE_FILE","sourceFile":{"name":"//app:main.go","location":"/ws/app/BUILD:1:1"}}
//! {"type":"GENERATED_FILE","generatedFile":{"name":"//app:bin.exe","generatingRule":"//app:bin"}}
//! ```
//!
//! Records become [`Target`]s as follows:
//!
//! - **Rules**: attribute bytes are the canonical JSON of the rule class and attribute list,
//!   minus `generator_location` (which embeds absolute paths and line numbers). Inputs that
//!   are rules or generated files become dependencies; inputs that are source files become
//!   source references carrying the source file's metadata digest; inputs unknown to the
//!   query (targets in external repositories) become name-only source references.
//! - **Source files**: a target whose only source reference is itself. Its caller digest is
//!   the canonical JSON of the record without `location`, so visibility changes are seen.
//! - **Generated files**: a target depending on its generating rule.
//! - **Package and environment groups**: attribute-only targets.
//!
//! Canonical JSON relies on `serde_json` maps being sorted by key.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::core::DifferError;
use crate::graph::{BuildGraph, SourceRef, Target};
use crate::impact::ImpactSet;

/// Attribute carrying the BUILD file location of the macro that generated a rule.
const GENERATOR_LOCATION: &str = "generator_location";

/// One record of streamed query output.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryTarget {
    Rule {
        name: String,
        attributes: Vec<u8>,
        inputs: Vec<String>,
    },
    SourceFile {
        name: String,
        digest: Vec<u8>,
    },
    GeneratedFile {
        name: String,
        generating_rule: String,
    },
    /// Package groups and environment groups
    Other {
        name: String,
        attributes: Vec<u8>,
    },
}

impl QueryTarget {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Rule {
                name,
                ..
            }
            | Self::SourceFile {
                name,
                ..
            }
            | Self::GeneratedFile {
                name,
                ..
            }
            | Self::Other {
                name,
                ..
            } => name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTarget {
    #[serde(rename = "type")]
    kind: String,
    rule: Option<RawRule>,
    source_file: Option<Value>,
    generated_file: Option<RawGeneratedFile>,
    package_group: Option<Value>,
    environment_group: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRule {
    name: String,
    rule_class: String,
    #[serde(default)]
    attribute: Vec<Value>,
    #[serde(default)]
    rule_input: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGeneratedFile {
    name: String,
    generating_rule: String,
}

/// Parses `--output=streamed_jsonproto` output. Blank lines are ignored.
///
/// # Errors
///
/// Returns [`DifferError::QueryOutputParseError`] with the 1-based line number of the first
/// malformed record.
pub fn parse_streamed_jsonproto(output: &str) -> Result<Vec<QueryTarget>, DifferError> {
    let mut targets = Vec::new();
    for (number, line) in output.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parse_error = |reason: String| DifferError::QueryOutputParseError {
            line: number + 1,
            reason,
        };

        let raw: RawTarget = serde_json::from_str(line).map_err(|e| parse_error(e.to_string()))?;
        targets.push(convert_record(raw).map_err(parse_error)?);
    }
    Ok(targets)
}

fn convert_record(raw: RawTarget) -> Result<QueryTarget, String> {
    let missing = |field: &str| format!("{} record without '{field}'", raw.kind);

    match raw.kind.as_str() {
        "RULE" => {
            let rule = raw.rule.ok_or_else(|| missing("rule"))?;
            let attributes: Vec<Value> = rule
                .attribute
                .into_iter()
                .filter(|attr| attr.get("name").and_then(Value::as_str) != Some(GENERATOR_LOCATION))
                .collect();
            let canonical = serde_json::json!({
                "ruleClass": rule.rule_class,
                "attribute": attributes,
            });
            Ok(QueryTarget::Rule {
                name: rule.name,
                attributes: canonical_bytes(&canonical)?,
                inputs: rule.rule_input,
            })
        }
        "SOURCE_FILE" => {
            let record = raw.source_file.ok_or_else(|| missing("sourceFile"))?;
            let (name, digest) = named_without_location(record)?;
            Ok(QueryTarget::SourceFile {
                name,
                digest,
            })
        }
        "GENERATED_FILE" => {
            let record = raw.generated_file.ok_or_else(|| missing("generatedFile"))?;
            Ok(QueryTarget::GeneratedFile {
                name: record.name,
                generating_rule: record.generating_rule,
            })
        }
        "PACKAGE_GROUP" | "ENVIRONMENT_GROUP" => {
            let record = raw
                .package_group
                .or(raw.environment_group)
                .ok_or_else(|| missing("packageGroup/environmentGroup"))?;
            let (name, attributes) = named_without_location(record)?;
            Ok(QueryTarget::Other {
                name,
                attributes,
            })
        }
        other => Err(format!("unknown target type '{other}'")),
    }
}

/// Extracts `name` and returns the canonical JSON of the record minus `location`.
fn named_without_location(mut record: Value) -> Result<(String, Vec<u8>), String> {
    let object = record.as_object_mut().ok_or_else(|| "record is not an object".to_string())?;
    object.remove("location");
    let name = object
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| "record without 'name'".to_string())?;
    Ok((name, canonical_bytes(&record)?))
}

fn canonical_bytes(value: &Value) -> Result<Vec<u8>, String> {
    serde_json::to_vec(value).map_err(|e| e.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordKind {
    Rule,
    SourceFile,
    GeneratedFile,
    Other,
}

/// Builds the dependency graph from parsed query records.
///
/// # Errors
///
/// Returns [`DifferError::DuplicateTarget`] if two records share a label.
pub fn build_graph(records: Vec<QueryTarget>) -> Result<BuildGraph, DifferError> {
    let mut kinds: HashMap<String, RecordKind> = HashMap::with_capacity(records.len());
    let mut source_digests: HashMap<String, Vec<u8>> = HashMap::new();
    for record in &records {
        let kind = match record {
            QueryTarget::Rule {
                ..
            } => RecordKind::Rule,
            QueryTarget::SourceFile {
                name,
                digest,
            } => {
                source_digests.insert(name.clone(), digest.clone());
                RecordKind::SourceFile
            }
            QueryTarget::GeneratedFile {
                ..
            } => RecordKind::GeneratedFile,
            QueryTarget::Other {
                ..
            } => RecordKind::Other,
        };
        kinds.insert(record.name().to_string(), kind);
    }

    let input_as = |target: Target, input: String| -> Target {
        match kinds.get(&input) {
            Some(RecordKind::Rule | RecordKind::GeneratedFile | RecordKind::Other) => {
                target.with_dep(input)
            }
            Some(RecordKind::SourceFile) => {
                let digest = source_digests.get(&input).cloned().unwrap_or_default();
                target.with_source(SourceRef::with_digest(input, digest))
            }
            None => target.with_source(SourceRef::new(input)),
        }
    };

    let mut graph = BuildGraph::new();
    let mut external_inputs = 0usize;
    for record in records {
        let target = match record {
            QueryTarget::Rule {
                name,
                attributes,
                inputs,
            } => {
                external_inputs += inputs.iter().filter(|i| !kinds.contains_key(*i)).count();
                inputs
                    .into_iter()
                    .fold(Target::new(name).with_attributes(attributes), |t, i| input_as(t, i))
            }
            QueryTarget::SourceFile {
                name,
                digest,
            } => Target::new(name.clone()).with_source(SourceRef::with_digest(name, digest)),
            QueryTarget::GeneratedFile {
                name,
                generating_rule,
            } => input_as(Target::new(name), generating_rule),
            QueryTarget::Other {
                name,
                attributes,
            } => Target::new(name).with_attributes(attributes),
        };
        graph.insert(target)?;
    }

    tracing::debug!(
        target: "bazel",
        "Built graph with {} targets ({} inputs outside the queried universe)",
        graph.len(),
        external_inputs
    );
    Ok(graph)
}

/// Parses `--output=label` output into a set of labels.
#[must_use]
pub fn parse_label_output(output: &str) -> ImpactSet {
    output.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect()
}
