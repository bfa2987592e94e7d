//! In-memory collaborators for driving [`ImpactPipeline`](crate::pipeline::ImpactPipeline)
//! without git or Bazel.
//!
//! [`FakeVcs`] and [`StaticGraphSource`] share checkout state: the graph source serves the
//! graph registered for whichever commit the fake VCS last checked out.

use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::bazel::{GraphSource, QueryRefiner};
use crate::core::DifferError;
use crate::graph::BuildGraph;
use crate::impact::ImpactSet;
use crate::vcs::Vcs;

#[derive(Debug, Default)]
struct VcsState {
    head: String,
    checkouts: Vec<String>,
}

/// Version control over a fixed set of refs.
#[derive(Debug, Clone)]
pub struct FakeVcs {
    refs: BTreeMap<String, String>,
    fail_checkout: BTreeSet<String>,
    state: Arc<Mutex<VcsState>>,
}

impl FakeVcs {
    /// Starts with `head` checked out.
    pub fn new(head: impl Into<String>) -> Self {
        Self {
            refs: BTreeMap::new(),
            fail_checkout: BTreeSet::new(),
            state: Arc::new(Mutex::new(VcsState {
                head: head.into(),
                checkouts: Vec::new(),
            })),
        }
    }

    /// Makes `name` resolve to `commit`. Commits always resolve to themselves.
    #[must_use]
    pub fn with_revision(mut self, name: impl Into<String>, commit: impl Into<String>) -> Self {
        let commit = commit.into();
        self.refs.insert(commit.clone(), commit.clone());
        self.refs.insert(name.into(), commit);
        self
    }

    /// Makes checking out `revision` fail.
    #[must_use]
    pub fn failing_checkout(mut self, revision: impl Into<String>) -> Self {
        self.fail_checkout.insert(revision.into());
        self
    }

    fn state(&self) -> MutexGuard<'_, VcsState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Currently checked-out revision.
    pub fn head(&self) -> String {
        self.state().head.clone()
    }

    /// Every revision passed to `checkout`, in order.
    pub fn checkouts(&self) -> Vec<String> {
        self.state().checkouts.clone()
    }

    /// Graph source that follows this VCS's checkouts.
    pub fn graph_source(&self) -> StaticGraphSource {
        StaticGraphSource {
            state: Arc::clone(&self.state),
            graphs: BTreeMap::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Vcs for FakeVcs {
    async fn resolve(&self, revision: &str) -> Result<String> {
        self.refs.get(revision).cloned().ok_or_else(|| {
            DifferError::GitCheckoutFailed {
                reference: revision.to_string(),
                reason: "unknown revision".to_string(),
            }
            .into()
        })
    }

    async fn checkout(&self, revision: &str) -> Result<()> {
        let mut state = self.state();
        state.checkouts.push(revision.to_string());
        if self.fail_checkout.contains(revision) {
            return Err(DifferError::GitCheckoutFailed {
                reference: revision.to_string(),
                reason: "checkout rejected".to_string(),
            }
            .into());
        }
        state.head = revision.to_string();
        Ok(())
    }

    async fn current_revision(&self) -> Result<String> {
        Ok(self.head())
    }
}

/// Serves a prebuilt graph per checked-out commit and counts queries.
#[derive(Debug, Clone)]
pub struct StaticGraphSource {
    state: Arc<Mutex<VcsState>>,
    graphs: BTreeMap<String, BuildGraph>,
    calls: Arc<AtomicUsize>,
}

impl StaticGraphSource {
    #[must_use]
    pub fn with_graph(mut self, commit: impl Into<String>, graph: BuildGraph) -> Self {
        self.graphs.insert(commit.into(), graph);
        self
    }

    /// Number of `build_graph` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shared call counter, for inspecting a source after it was moved into a pipeline.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl GraphSource for StaticGraphSource {
    async fn build_graph(&self) -> Result<BuildGraph> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let head = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).head.clone();
        self.graphs
            .get(&head)
            .cloned()
            .ok_or_else(|| anyhow!("No graph registered for revision {head}"))
    }
}

/// Refiner that keeps only labels from an allow-list and records each request.
#[derive(Debug, Clone, Default)]
pub struct RecordingRefiner {
    keep: Option<BTreeSet<String>>,
    requests: Arc<Mutex<Vec<(String, ImpactSet)>>>,
}

impl RecordingRefiner {
    /// Refiner that returns its input unchanged.
    #[must_use]
    pub fn identity() -> Self {
        Self::default()
    }

    /// Refiner that intersects non-empty templates' input with `labels`.
    #[must_use]
    pub fn keeping<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keep: Some(labels.into_iter().map(Into::into).collect()),
            requests: Arc::default(),
        }
    }

    /// Templates and target sets passed in so far.
    pub fn requests(&self) -> Vec<(String, ImpactSet)> {
        self.requests.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}

impl QueryRefiner for RecordingRefiner {
    async fn query_targets(&self, template: &str, targets: &ImpactSet) -> Result<ImpactSet> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((template.to_string(), targets.clone()));

        if template.is_empty() || targets.is_empty() {
            return Ok(if template.is_empty() { targets.clone() } else { ImpactSet::new() });
        }
        Ok(match &self.keep {
            Some(keep) => targets.intersection(keep).cloned().collect(),
            None => targets.clone(),
        })
    }
}
