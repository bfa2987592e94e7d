//! Build dependency graph model.
//!
//! A [`BuildGraph`] is an arena of [`Target`]s indexed by label. It is produced by a graph
//! source (see [`crate::bazel`]) for the current working-tree state, with macros expanded and
//! aliases flattened, and consumed by the [`crate::hashing::TargetFingerprinter`].
//!
//! The graph itself does not validate dependency edges: a target may name a dependency that
//! is never inserted. Edges are resolved, and cycles detected, when a [`TraversalPlan`] is
//! built for fingerprinting.

pub mod plan;

pub use plan::TraversalPlan;

use std::collections::HashMap;

use crate::core::DifferError;

/// A file or directory reference declared directly by a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRef {
    /// Label-like name, e.g. `//pkg:file.txt` or `@repo//pkg:file.txt`
    pub name: String,
    /// Caller-supplied digest bytes folded into the reference's digest
    pub digest: Vec<u8>,
}

impl SourceRef {
    /// Creates a reference with an empty caller digest.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            digest: Vec::new(),
        }
    }

    /// Creates a reference carrying build-tool metadata as its caller digest.
    pub fn with_digest(name: impl Into<String>, digest: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            digest: digest.into(),
        }
    }
}

/// A node in the build dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Unique label, e.g. `//path:name`
    pub label: String,
    /// Opaque rule configuration bytes
    pub attributes: Vec<u8>,
    /// Direct source references, in declared order (order is significant)
    pub sources: Vec<SourceRef>,
    /// Labels of direct dependencies (declaration order is not significant)
    pub deps: Vec<String>,
}

impl Target {
    /// Creates a target with no attributes, sources or dependencies.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            attributes: Vec::new(),
            sources: Vec::new(),
            deps: Vec::new(),
        }
    }

    /// Sets the attribute bytes.
    #[must_use]
    pub fn with_attributes(mut self, attributes: impl Into<Vec<u8>>) -> Self {
        self.attributes = attributes.into();
        self
    }

    /// Appends a source reference.
    #[must_use]
    pub fn with_source(mut self, source: SourceRef) -> Self {
        self.sources.push(source);
        self
    }

    /// Appends a dependency label.
    #[must_use]
    pub fn with_dep(mut self, dep: impl Into<String>) -> Self {
        self.deps.push(dep.into());
        self
    }
}

/// Arena of targets indexed by label.
#[derive(Debug, Default, Clone)]
pub struct BuildGraph {
    targets: Vec<Target>,
    index: HashMap<String, usize>,
}

impl BuildGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from a list of targets, rejecting duplicate labels.
    pub fn from_targets(targets: impl IntoIterator<Item = Target>) -> Result<Self, DifferError> {
        let mut graph = Self::new();
        for target in targets {
            graph.insert(target)?;
        }
        Ok(graph)
    }

    /// Adds a target to the graph.
    pub fn insert(&mut self, target: Target) -> Result<(), DifferError> {
        if self.index.contains_key(&target.label) {
            return Err(DifferError::DuplicateTarget {
                label: target.label,
            });
        }
        self.index.insert(target.label.clone(), self.targets.len());
        self.targets.push(target);
        Ok(())
    }

    /// Looks up a target by label.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&Target> {
        self.index.get(label).map(|&idx| &self.targets[idx])
    }

    /// Returns `true` if a target with this label exists.
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    /// Number of targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns `true` if the graph has no targets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Iterates over targets in insertion order.
    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.iter()
    }

    pub(crate) fn target_at(&self, idx: usize) -> &Target {
        &self.targets[idx]
    }

    pub(crate) fn position(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let graph = BuildGraph::from_targets([
            Target::new("//a:a").with_dep("//b:b"),
            Target::new("//b:b").with_source(SourceRef::new("//b:b.txt")),
        ])
        .unwrap();

        assert_eq!(graph.len(), 2);
        assert!(graph.contains("//a:a"));
        assert_eq!(graph.get("//a:a").unwrap().deps, vec!["//b:b"]);
        assert_eq!(graph.get("//b:b").unwrap().sources[0].name, "//b:b.txt");
        assert!(graph.get("//c:c").is_none());
    }

    #[test]
    fn test_duplicate_label_rejected() {
        let result = BuildGraph::from_targets([Target::new("//a:a"), Target::new("//a:a")]);
        let err = result.unwrap_err();
        assert!(matches!(err, DifferError::DuplicateTarget { ref label } if label == "//a:a"));
    }

    #[test]
    fn test_dangling_dependency_is_accepted_until_planning() {
        let graph = BuildGraph::from_targets([Target::new("//a:a").with_dep("//x:y")]).unwrap();
        assert_eq!(graph.len(), 1);
        assert!(!graph.contains("//x:y"));
    }
}
