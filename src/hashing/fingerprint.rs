//! Whole-graph fingerprinting.
//!
//! [`TargetFingerprinter`] validates a [`BuildGraph`], then walks it in topological waves.
//! Targets within a wave have no dependencies on each other and are digested concurrently on
//! the blocking thread pool; the next wave starts once every target of the current wave has a
//! fingerprint. Source reference digests are memoized for the duration of one pass, so a file
//! shared by many targets is read once.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};

use super::digest::SourceDigester;
use super::{Fingerprint, FingerprintMap};
use crate::core::{CancellationToken, DifferError};
use crate::graph::{BuildGraph, SourceRef, TraversalPlan};

/// Source digests memoized within one pass, keyed by reference name and caller digest.
type DigestMemo = DashMap<(String, Vec<u8>), [u8; 32]>;

/// Inputs to a fingerprinting pass besides the graph itself.
#[derive(Debug, Clone)]
pub struct FingerprintOptions {
    /// Workspace root used to resolve `//` labels to files. `None` disables file access.
    pub working_dir: Option<PathBuf>,
    /// Files whose contents are folded into every target's fingerprint
    pub seed_paths: Vec<PathBuf>,
    /// Seed file list, re-read at the start of every pass so each checkout uses its own
    pub seed_list: Option<PathBuf>,
    /// Maximum number of targets digested concurrently
    pub max_parallel: usize,
}

impl Default for FingerprintOptions {
    fn default() -> Self {
        Self {
            working_dir: None,
            seed_paths: Vec::new(),
            seed_list: None,
            max_parallel: crate::config::default_max_parallel(),
        }
    }
}

/// Computes a [`FingerprintMap`] for a build graph.
#[derive(Debug, Clone)]
pub struct TargetFingerprinter {
    options: FingerprintOptions,
    digester: SourceDigester,
}

impl TargetFingerprinter {
    /// Creates a fingerprinter reading sources from the real filesystem.
    #[must_use]
    pub fn new(options: FingerprintOptions) -> Self {
        let digester = SourceDigester::new(options.working_dir.clone());
        Self {
            options,
            digester,
        }
    }

    /// Creates a fingerprinter using a preconfigured digester. The digester's working
    /// directory takes precedence over `options.working_dir`.
    #[must_use]
    pub fn with_digester(options: FingerprintOptions, digester: SourceDigester) -> Self {
        Self {
            options,
            digester,
        }
    }

    /// Fingerprints every target of `graph`.
    ///
    /// Either returns a fingerprint for every target or fails; partial results are
    /// discarded.
    ///
    /// # Errors
    ///
    /// - [`DifferError::UnresolvedDependency`] or [`DifferError::CircularDependency`] for an
    ///   invalid graph
    /// - [`DifferError::SeedFileUnreadable`] if a seed file cannot be read
    /// - [`DifferError::SourceDigestFailed`] if a source exists but cannot be read
    /// - [`DifferError::Cancelled`] if `cancel` fires during the pass
    pub async fn fingerprint(
        &self,
        graph: &BuildGraph,
        cancel: &CancellationToken,
    ) -> Result<FingerprintMap, DifferError> {
        let plan = TraversalPlan::new(graph)?;
        let seeds = Arc::new(self.seed_digests(cancel).await?);
        let memo: Arc<DigestMemo> = Arc::new(DashMap::new());
        let concurrency = self.options.max_parallel.max(1);

        tracing::info!(
            target: "hashing",
            "Fingerprinting {} targets ({} seed files, {} waves)",
            graph.len(),
            seeds.len(),
            plan.waves().len()
        );

        let mut fingerprints: Vec<Option<Fingerprint>> = vec![None; graph.len()];

        for (wave_number, wave) in plan.waves().iter().enumerate() {
            cancel.check()?;

            let mut jobs = Vec::with_capacity(wave.len());
            for &idx in wave {
                let target = graph.target_at(idx);
                let deps = plan
                    .deps_of(idx)
                    .iter()
                    .map(|&dep| {
                        fingerprints[dep].ok_or_else(|| DifferError::Other {
                            message: format!(
                                "Dependency '{}' of '{}' was not fingerprinted before its dependent",
                                graph.target_at(dep).label,
                                target.label
                            ),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                jobs.push(TargetJob {
                    idx,
                    attributes: target.attributes.clone(),
                    sources: target.sources.clone(),
                    deps,
                });
            }

            let results: Vec<Result<(usize, Fingerprint), DifferError>> = stream::iter(jobs)
                .map(|job| {
                    let digester = self.digester.clone();
                    let seeds = Arc::clone(&seeds);
                    let memo = Arc::clone(&memo);
                    let cancel = cancel.clone();
                    async move {
                        tokio::task::spawn_blocking(move || {
                            job.run(&digester, &seeds, &memo, &cancel)
                        })
                        .await
                        .map_err(|e| DifferError::Other {
                            message: format!("Fingerprinting task failed: {e}"),
                        })?
                    }
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

            for result in results {
                let (idx, fingerprint) = result?;
                fingerprints[idx] = Some(fingerprint);
            }

            tracing::trace!(target: "hashing", "Wave {} done ({} targets)", wave_number, wave.len());
        }

        let mut map = FingerprintMap::new();
        for (idx, fingerprint) in fingerprints.into_iter().enumerate() {
            let label = &graph.target_at(idx).label;
            let fingerprint = fingerprint.ok_or_else(|| DifferError::Other {
                message: format!("Target '{label}' was never fingerprinted"),
            })?;
            map.insert(label.clone(), fingerprint);
        }

        tracing::debug!(
            target: "hashing",
            "Fingerprinted {} targets, {} distinct sources read",
            map.len(),
            memo.len()
        );
        Ok(map)
    }

    /// SHA-256 of every distinct seed file, sorted by path.
    async fn seed_digests(&self, cancel: &CancellationToken) -> Result<Vec<[u8; 32]>, DifferError> {
        let working_dir = self.digester.working_dir().map(Path::to_path_buf);
        let mut listed = self.options.seed_paths.clone();
        let seed_list = self.options.seed_list.clone();

        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<[u8; 32]>, DifferError> {
            if let Some(list) = &seed_list {
                cancel.check()?;
                listed.extend(crate::output::read_seed_list(list)?);
            }
            let paths: BTreeSet<PathBuf> =
                listed.iter().map(|p| resolve_seed(working_dir.as_deref(), p)).collect();
            tracing::debug!(target: "hashing", "Using {} seed files", paths.len());

            paths
                .iter()
                .map(|path| -> Result<[u8; 32], DifferError> {
                    cancel.check()?;
                    let contents = std::fs::read(path).map_err(|e| DifferError::SeedFileUnreadable {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })?;
                    Ok(Sha256::digest(&contents).into())
                })
                .collect()
        })
        .await
        .map_err(|e| DifferError::Other {
            message: format!("Seed digest task failed: {e}"),
        })?
    }
}

fn resolve_seed(working_dir: Option<&Path>, path: &Path) -> PathBuf {
    match working_dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

/// Owned inputs for fingerprinting one target on the blocking pool.
struct TargetJob {
    idx: usize,
    attributes: Vec<u8>,
    sources: Vec<SourceRef>,
    deps: Vec<Fingerprint>,
}

impl TargetJob {
    fn run(
        self,
        digester: &SourceDigester,
        seeds: &[[u8; 32]],
        memo: &DigestMemo,
        cancel: &CancellationToken,
    ) -> Result<(usize, Fingerprint), DifferError> {
        let mut hasher = Sha256::new();
        hasher.update(&self.attributes);
        for seed in seeds {
            hasher.update(seed);
        }

        for source in self.sources {
            let key = (source.name, source.digest);
            let cached = memo.get(&key).map(|entry| *entry);
            let digest = match cached {
                Some(digest) => digest,
                None => {
                    let resolved = digester.digest(&key.0, &key.1, cancel)?;
                    let digest = *resolved.digest();
                    memo.insert(key, digest);
                    digest
                }
            };
            hasher.update(digest);
        }

        for dep in &self.deps {
            hasher.update(dep.as_bytes());
        }

        Ok((self.idx, Fingerprint::from_bytes(hasher.finalize().into())))
    }
}
