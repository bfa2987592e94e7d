//! Dependency-order traversal planning.
//!
//! A [`TraversalPlan`] resolves every dependency label of a [`BuildGraph`] to an arena index,
//! rejects graphs with unresolved references or cycles, and groups the targets into
//! topological waves: every target in wave `n` depends only on targets in waves `< n`.
//! Targets in the same wave can therefore be fingerprinted concurrently.

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use super::BuildGraph;
use crate::core::DifferError;

/// Color states for cycle detection using DFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Node has not been visited.
    White,
    /// Node is on the current DFS path.
    Gray,
    /// Node and all its dependencies are fully visited.
    Black,
}

/// Validated traversal order for a [`BuildGraph`].
#[derive(Debug, Clone)]
pub struct TraversalPlan {
    /// Arena indices grouped by topological wave, each wave sorted by label
    waves: Vec<Vec<usize>>,
    /// Per-target dependency indices, deduplicated and sorted by dependency label
    deps: Vec<Vec<usize>>,
}

impl TraversalPlan {
    /// Validates the graph and computes its topological waves.
    ///
    /// # Errors
    ///
    /// - [`DifferError::UnresolvedDependency`] if a target names a dependency absent from the
    ///   graph
    /// - [`DifferError::CircularDependency`] if the dependency relation has a cycle
    pub fn new(graph: &BuildGraph) -> Result<Self, DifferError> {
        let deps = resolve_deps(graph)?;

        // Edges point from a target to each of its dependencies
        let mut dag: DiGraph<usize, ()> = DiGraph::with_capacity(graph.len(), 0);
        for idx in 0..graph.len() {
            dag.add_node(idx);
        }
        for (idx, target_deps) in deps.iter().enumerate() {
            for &dep in target_deps {
                dag.add_edge(NodeIndex::new(idx), NodeIndex::new(dep), ());
            }
        }

        if let Some(cycle) = find_cycle(&dag) {
            let chain = cycle
                .iter()
                .map(|node| graph.target_at(node.index()).label.as_str())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(DifferError::CircularDependency {
                chain,
            });
        }

        let waves = layer(&dag, graph);
        tracing::debug!(
            target: "hashing",
            "Planned {} targets in {} waves",
            graph.len(),
            waves.len()
        );

        Ok(Self {
            waves,
            deps,
        })
    }

    /// Topological waves of arena indices, dependencies first.
    #[must_use]
    pub fn waves(&self) -> &[Vec<usize>] {
        &self.waves
    }

    /// Dependencies of the target at `idx`, sorted by label.
    #[must_use]
    pub fn deps_of(&self, idx: usize) -> &[usize] {
        &self.deps[idx]
    }
}

fn resolve_deps(graph: &BuildGraph) -> Result<Vec<Vec<usize>>, DifferError> {
    let mut resolved = Vec::with_capacity(graph.len());
    for target in graph.targets() {
        let mut labels: Vec<&str> = target.deps.iter().map(String::as_str).collect();
        labels.sort_unstable();
        labels.dedup();

        let mut indices = Vec::with_capacity(labels.len());
        for label in labels {
            let idx = graph.position(label).ok_or_else(|| DifferError::UnresolvedDependency {
                target: target.label.clone(),
                dependency: label.to_string(),
            })?;
            indices.push(idx);
        }
        resolved.push(indices);
    }
    Ok(resolved)
}

/// Iterative three-color DFS. Returns the cycle path with its first node repeated at the end.
fn find_cycle(dag: &DiGraph<usize, ()>) -> Option<Vec<NodeIndex>> {
    let mut colors = vec![Color::White; dag.node_count()];

    for start in dag.node_indices() {
        if colors[start.index()] != Color::White {
            continue;
        }

        colors[start.index()] = Color::Gray;
        let mut stack: Vec<(NodeIndex, Vec<NodeIndex>)> =
            vec![(start, dag.neighbors(start).collect())];

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            match frame.1.pop() {
                Some(next) => match colors[next.index()] {
                    Color::Gray => {
                        let begin = stack.iter().position(|(n, _)| *n == next).unwrap_or(0);
                        let mut cycle: Vec<NodeIndex> =
                            stack[begin..].iter().map(|(n, _)| *n).collect();
                        cycle.push(next);
                        return Some(cycle);
                    }
                    Color::White => {
                        colors[next.index()] = Color::Gray;
                        stack.push((next, dag.neighbors(next).collect()));
                    }
                    Color::Black => {}
                },
                None => {
                    colors[node.index()] = Color::Black;
                    stack.pop();
                }
            }
        }
    }

    None
}

/// Kahn layering over an acyclic graph.
fn layer(dag: &DiGraph<usize, ()>, graph: &BuildGraph) -> Vec<Vec<usize>> {
    let mut remaining: Vec<usize> =
        dag.node_indices().map(|n| dag.neighbors(n).count()).collect();

    let mut current: Vec<usize> =
        (0..remaining.len()).filter(|&idx| remaining[idx] == 0).collect();
    let mut waves = Vec::new();

    while !current.is_empty() {
        current.sort_by(|a, b| graph.target_at(*a).label.cmp(&graph.target_at(*b).label));

        let mut next = Vec::new();
        for &idx in &current {
            for dependent in dag.neighbors_directed(NodeIndex::new(idx), Direction::Incoming) {
                let slot = &mut remaining[dependent.index()];
                *slot -= 1;
                if *slot == 0 {
                    next.push(dependent.index());
                }
            }
        }

        waves.push(std::mem::take(&mut current));
        current = next;
    }

    waves
}
