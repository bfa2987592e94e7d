//! End-to-end impact computation between two revisions.
//!
//! For each revision, in order: resolve it to a commit, check it out, and either reuse the
//! cached fingerprint map or query the build graph and fingerprint it (storing the result).
//! The two maps are then diffed and the impacted set is optionally refined by a query.
//!
//! Both revisions share one working tree, so they are processed strictly one after the
//! other. The checkout the user started from is restored afterwards, also when the run
//! fails.

use anyhow::{Context, Result};

use crate::bazel::{GraphSource, QueryRefiner};
use crate::cache::HashCache;
use crate::core::{CancellationToken, DifferError};
use crate::hashing::{FingerprintMap, TargetFingerprinter};
use crate::impact::{ImpactAnalyzer, ImpactSet, ImpactSummary};
use crate::vcs::Vcs;

/// Outcome of comparing two revisions.
#[derive(Debug, Clone)]
pub struct ImpactReport {
    /// Commit the starting revision resolved to
    pub starting_commit: String,
    /// Commit the final revision resolved to
    pub final_commit: String,
    /// Impacted targets after refinement
    pub impacted: ImpactSet,
    /// Diff counts before refinement
    pub summary: ImpactSummary,
}

/// Wires version control, graph extraction, fingerprinting, caching and refinement.
pub struct ImpactPipeline<V, G, R> {
    vcs: V,
    graph_source: G,
    refiner: R,
    cache: HashCache,
    fingerprinter: TargetFingerprinter,
    query: String,
}

impl<V, G, R> ImpactPipeline<V, G, R>
where
    V: Vcs,
    G: GraphSource,
    R: QueryRefiner,
{
    pub fn new(
        vcs: V,
        graph_source: G,
        refiner: R,
        cache: HashCache,
        fingerprinter: TargetFingerprinter,
    ) -> Self {
        Self {
            vcs,
            graph_source,
            refiner,
            cache,
            fingerprinter,
            query: String::new(),
        }
    }

    /// Sets the refinement query template. Empty disables refinement.
    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Computes the targets impacted between `starting` and `final_revision`, restoring the
    /// original checkout afterwards.
    pub async fn run(
        &self,
        starting: &str,
        final_revision: &str,
        cancel: &CancellationToken,
    ) -> Result<ImpactReport> {
        let original = self
            .vcs
            .current_revision()
            .await
            .context("Failed to determine the current checkout")?;

        let result = self.compare(starting, final_revision, cancel).await;

        tracing::debug!(target: "pipeline", "Restoring original checkout {}", original);
        if let Err(e) = self.vcs.checkout(&original).await {
            tracing::warn!(
                target: "pipeline",
                "Failed to restore original checkout {}: {:#}",
                original,
                e
            );
        }

        result
    }

    async fn compare(
        &self,
        starting: &str,
        final_revision: &str,
        cancel: &CancellationToken,
    ) -> Result<ImpactReport> {
        let (starting_commit, before) = self.hashes_for(starting, cancel).await?;
        let (final_commit, after) = self.hashes_for(final_revision, cancel).await?;

        let summary = ImpactAnalyzer::summarize(&before, &after);
        let impacted = ImpactAnalyzer::diff(&before, &after);
        tracing::info!(
            target: "pipeline",
            "{}..{}: {}",
            short(&starting_commit),
            short(&final_commit),
            summary
        );

        cancel.check()?;
        let impacted = self.refiner.query_targets(&self.query, &impacted).await?;

        Ok(ImpactReport {
            starting_commit,
            final_commit,
            impacted,
            summary,
        })
    }

    /// Fingerprint map of `revision`, from the cache or freshly computed. Leaves `revision`
    /// checked out.
    pub async fn hashes_for(
        &self,
        revision: &str,
        cancel: &CancellationToken,
    ) -> Result<(String, FingerprintMap)> {
        cancel.check()?;
        let commit = self.vcs.resolve(revision).await?;
        self.vcs
            .checkout(&commit)
            .await
            .with_context(|| format!("Unable to checkout revision: {revision}"))?;

        match self.cache.get(&commit).await {
            Ok(Some(map)) => {
                tracing::info!(
                    target: "pipeline",
                    "Using cached fingerprints for {} ({} targets)",
                    revision,
                    map.len()
                );
                return Ok((commit, map));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(target: "pipeline", "{}; recomputing fingerprints", e);
            }
        }

        let map = self.fingerprint_checkout(cancel).await?;

        if let Err(e) = self.cache.put(&commit, &map).await {
            tracing::warn!(target: "pipeline", "{}; continuing without caching", e);
        }

        Ok((commit, map))
    }

    /// Fingerprints the working tree as currently checked out, bypassing the cache.
    pub async fn fingerprint_checkout(&self, cancel: &CancellationToken) -> Result<FingerprintMap> {
        cancel.check()?;
        let graph = self.graph_source.build_graph().await?;
        let map = self.fingerprinter.fingerprint(&graph, cancel).await.map_err(|e| {
            if matches!(e, DifferError::Cancelled { .. }) {
                tracing::info!(target: "pipeline", "Fingerprinting cancelled");
            }
            e
        })?;
        Ok(map)
    }
}

fn short(commit: &str) -> &str {
    commit.get(..12).unwrap_or(commit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::FingerprintOptions;
    use crate::test_utils::{FakeVcs, RecordingRefiner, sample_graph};
    use tempfile::TempDir;

    fn fingerprinter() -> TargetFingerprinter {
        TargetFingerprinter::new(FingerprintOptions {
            max_parallel: 2,
            ..FingerprintOptions::default()
        })
    }

    fn workspace() -> FakeVcs {
        FakeVcs::new("feature").with_revision("base", "c1").with_revision("head", "c2")
    }

    #[tokio::test]
    async fn test_reports_changed_targets_and_restores_checkout() {
        let vcs = workspace();
        let graphs = vcs
            .graph_source()
            .with_graph("c1", sample_graph("v1"))
            .with_graph("c2", sample_graph("v2"));
        let pipeline = ImpactPipeline::new(
            vcs.clone(),
            graphs,
            RecordingRefiner::identity(),
            HashCache::Disabled,
            fingerprinter(),
        );

        let report = pipeline.run("base", "head", &CancellationToken::new()).await.unwrap();

        assert_eq!(report.starting_commit, "c1");
        assert_eq!(report.final_commit, "c2");
        let impacted: Vec<_> = report.impacted.iter().map(String::as_str).collect();
        assert_eq!(impacted, vec!["//app:app", "//lib:lib", "//lib:lib.rs"]);
        assert_eq!(report.summary.changed, 3);
        assert_eq!(report.summary.unchanged, 1);
        assert_eq!(vcs.checkouts(), vec!["c1", "c2", "feature"]);
        assert_eq!(vcs.head(), "feature");
    }

    #[tokio::test]
    async fn test_cache_hit_skips_graph_query() {
        let temp = TempDir::new().unwrap();
        let vcs = workspace();
        let graphs = vcs
            .graph_source()
            .with_graph("c1", sample_graph("v1"))
            .with_graph("c2", sample_graph("v1"));
        let calls = graphs.call_counter();
        let pipeline = ImpactPipeline::new(
            vcs,
            graphs,
            RecordingRefiner::identity(),
            HashCache::directory(temp.path()),
            fingerprinter(),
        );
        let cancel = CancellationToken::new();

        let first = pipeline.run("base", "head", &cancel).await.unwrap();
        assert!(first.impacted.is_empty());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);

        let second = pipeline.run("base", "head", &cancel).await.unwrap();
        assert!(second.impacted.is_empty());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refinement_receives_impacted_set() {
        let vcs = workspace();
        let graphs = vcs
            .graph_source()
            .with_graph("c1", sample_graph("v1"))
            .with_graph("c2", sample_graph("v2"));
        let refiner = RecordingRefiner::keeping(["//app:app"]);
        let pipeline = ImpactPipeline::new(
            vcs,
            graphs,
            refiner.clone(),
            HashCache::Disabled,
            fingerprinter(),
        )
        .with_query("kind(rust_binary, set({{ targets }}))");

        let report = pipeline.run("base", "head", &CancellationToken::new()).await.unwrap();

        assert_eq!(report.impacted.len(), 1);
        assert!(report.impacted.contains("//app:app"));
        let requests = refiner.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].1.len(), 3);
    }

    #[tokio::test]
    async fn test_failure_still_restores_checkout() {
        let vcs = workspace().failing_checkout("c2");
        let graphs = vcs.graph_source().with_graph("c1", sample_graph("v1"));
        let pipeline = ImpactPipeline::new(
            vcs.clone(),
            graphs,
            RecordingRefiner::identity(),
            HashCache::Disabled,
            fingerprinter(),
        );

        let err = pipeline.run("base", "head", &CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("Unable to checkout revision: head"));
        assert_eq!(vcs.head(), "feature");
    }

    #[tokio::test]
    async fn test_unknown_revision_fails() {
        let vcs = workspace();
        let graphs = vcs.graph_source();
        let pipeline = ImpactPipeline::new(
            vcs.clone(),
            graphs,
            RecordingRefiner::identity(),
            HashCache::Disabled,
            fingerprinter(),
        );

        let err = pipeline.run("nope", "head", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DifferError>(),
            Some(DifferError::GitCheckoutFailed { reference, .. }) if reference == "nope"
        ));
        assert_eq!(vcs.checkouts(), vec!["feature"]);
    }

    #[tokio::test]
    async fn test_cancelled_run_stores_nothing() {
        let temp = TempDir::new().unwrap();
        let vcs = workspace();
        let graphs = vcs.graph_source().with_graph("c1", sample_graph("v1"));
        let cache = HashCache::directory(temp.path());
        let pipeline = ImpactPipeline::new(
            vcs.clone(),
            graphs,
            RecordingRefiner::identity(),
            cache.clone(),
            fingerprinter(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = pipeline.run("base", "head", &cancel).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<DifferError>(), Some(DifferError::Cancelled { .. })));
        assert!(cache.get("c1").await.unwrap().is_none());
        assert_eq!(vcs.head(), "feature");
    }
}
