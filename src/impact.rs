//! Diffing fingerprint maps into impacted targets.
//!
//! A target is impacted when it exists in the final revision and either did not exist in the
//! starting revision or its fingerprint changed. Targets that only exist in the starting
//! revision were deleted; there is nothing left to build or test for them, so they are not
//! reported.

use std::collections::BTreeSet;
use std::fmt;

use crate::hashing::FingerprintMap;

/// Ordered set of impacted target labels.
pub type ImpactSet = BTreeSet<String>;

/// Counts describing how two fingerprint maps relate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImpactSummary {
    pub added: usize,
    pub changed: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl ImpactSummary {
    /// Number of impacted targets (`added + changed`).
    #[must_use]
    pub const fn impacted(&self) -> usize {
        self.added + self.changed
    }
}

impl fmt::Display for ImpactSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} changed, {} removed, {} unchanged",
            self.added, self.changed, self.removed, self.unchanged
        )
    }
}

/// Compares two revisions' fingerprint maps.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImpactAnalyzer;

impl ImpactAnalyzer {
    /// Returns every label of `after` that is absent from `before` or whose fingerprint
    /// differs.
    #[must_use]
    pub fn diff(before: &FingerprintMap, after: &FingerprintMap) -> ImpactSet {
        after
            .iter()
            .filter(|(label, fingerprint)| before.get(label) != Some(*fingerprint))
            .map(|(label, _)| label.clone())
            .collect()
    }

    /// Counts added, changed, removed and unchanged labels.
    #[must_use]
    pub fn summarize(before: &FingerprintMap, after: &FingerprintMap) -> ImpactSummary {
        let mut summary = ImpactSummary::default();
        for (label, fingerprint) in after.iter() {
            match before.get(label) {
                None => summary.added += 1,
                Some(previous) if previous == fingerprint => summary.unchanged += 1,
                Some(_) => summary.changed += 1,
            }
        }
        summary.removed = before.labels().filter(|label| !after.contains(label)).count();
        summary
    }
}
