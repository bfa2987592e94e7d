//! Bazel integration: graph extraction and query refinement
//!
//! bazel-differ treats Bazel as the source of truth for the build graph. For each revision
//! it runs one `bazel query` that lists every target of the workspace, including targets of
//! external repositories, and converts the streamed output into a
//! [`BuildGraph`](crate::graph::BuildGraph). After diffing, a second, optional query narrows
//! the impacted set with a user-supplied template.
//!
//! # Modules
//!
//! - [`command_builder`] - [`BazelCommand`] builder mirroring the git command builder
//! - [`query`] - Conversion of query output into graph targets
//! - [`template`] - Rendering of refinement query templates
//!
//! The pipeline depends on the [`GraphSource`] and [`QueryRefiner`] traits rather than on
//! [`BazelClient`] directly, so it can be driven by in-memory graphs in tests.

pub mod command_builder;
pub mod query;
pub mod template;

pub use command_builder::BazelCommand;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::DifferConfig;
use crate::core::DifferError;
use crate::graph::BuildGraph;
use crate::impact::ImpactSet;

/// Query listing every target of the main workspace and of external repositories.
pub const UNIVERSE_QUERY: &str = "//external:all-targets + //...:all-targets";

/// Produces the build graph of the working tree as currently checked out.
#[allow(async_fn_in_trait)]
pub trait GraphSource {
    async fn build_graph(&self) -> Result<BuildGraph>;
}

/// Narrows an impacted set with a query template.
#[allow(async_fn_in_trait)]
pub trait QueryRefiner {
    /// Renders `template` with `targets` and returns the labels the query yields.
    ///
    /// An empty template returns `targets` unchanged. An empty `targets` set returns an
    /// empty set without running a query.
    async fn query_targets(&self, template: &str, targets: &ImpactSet) -> Result<ImpactSet>;
}

/// Runs `bazel` in a workspace.
#[derive(Debug, Clone)]
pub struct BazelClient {
    workspace: PathBuf,
    bazel_path: PathBuf,
    startup_options: Vec<String>,
    command_options: Vec<String>,
    timeout: Option<Duration>,
}

impl BazelClient {
    pub fn new(workspace: impl Into<PathBuf>, bazel_path: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            bazel_path: bazel_path.into(),
            startup_options: Vec::new(),
            command_options: Vec::new(),
            timeout: None,
        }
    }

    /// Creates a client from the resolved configuration.
    #[must_use]
    pub fn from_config(workspace: impl Into<PathBuf>, config: &DifferConfig) -> Self {
        Self::new(workspace, config.bazel_path.clone())
            .with_startup_options(config.bazel_startup_options.clone())
            .with_command_options(config.bazel_command_options.clone())
            .with_timeout(config.timeout_secs.map(Duration::from_secs))
    }

    #[must_use]
    pub fn with_startup_options(mut self, options: Vec<String>) -> Self {
        self.startup_options = options;
        self
    }

    #[must_use]
    pub fn with_command_options(mut self, options: Vec<String>) -> Self {
        self.command_options = options;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn query_command(&self, expression: &str) -> BazelCommand {
        BazelCommand::query(&self.bazel_path, expression)
            .startup_options(self.startup_options.iter().cloned())
            .args(self.command_options.iter().cloned())
            .current_dir(&self.workspace)
            .with_timeout(self.timeout)
    }

    /// Fails with [`DifferError::BazelNotFound`] if the configured binary cannot be located.
    pub fn ensure_available(&self) -> Result<()> {
        if crate::utils::find_executable(&self.bazel_path).is_none() {
            return Err(DifferError::BazelNotFound {
                path: self.bazel_path.display().to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl GraphSource for BazelClient {
    async fn build_graph(&self) -> Result<BuildGraph> {
        let output = self
            .query_command(UNIVERSE_QUERY)
            .args(["--output=streamed_jsonproto", "--order_output=no"])
            .execute_stdout()
            .await
            .context("Failed to query the build graph")?;

        let records = query::parse_streamed_jsonproto(&output)?;
        let graph = query::build_graph(records)?;
        tracing::info!(
            target: "bazel",
            "Loaded {} targets from {}",
            graph.len(),
            self.workspace.display()
        );
        Ok(graph)
    }
}

impl QueryRefiner for BazelClient {
    async fn query_targets(&self, template: &str, targets: &ImpactSet) -> Result<ImpactSet> {
        if template.trim().is_empty() {
            return Ok(targets.clone());
        }
        if targets.is_empty() {
            tracing::debug!(target: "bazel", "No impacted targets, skipping refinement query");
            return Ok(ImpactSet::new());
        }

        let expression = template::render_query(template, targets)?;
        let output = self
            .query_command(&expression)
            .args(["--output=label", "--keep_going"])
            .execute_stdout()
            .await
            .context("Failed to run the refinement query")?;

        let refined = query::parse_label_output(&output);
        tracing::info!(
            target: "bazel",
            "Refinement query kept {} of {} impacted targets",
            refined.len(),
            targets.len()
        );
        Ok(refined)
    }
}
