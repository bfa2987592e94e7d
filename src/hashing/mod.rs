//! Content fingerprinting for build targets.
//!
//! This module assigns every target of a [`BuildGraph`](crate::graph::BuildGraph) a SHA-256
//! fingerprint derived from its rule attributes, the contents of its direct sources, a set of
//! workspace-wide seed files, and the fingerprints of its dependencies. Two revisions whose
//! targets carry equal fingerprints are considered identical for build purposes.
//!
//! # Modules
//!
//! - [`filesystem`] - Injectable filesystem access ([`Filesystem`], [`OsFilesystem`],
//!   [`MemoryFilesystem`])
//! - [`digest`] - Per-source-reference digests ([`SourceDigester`])
//! - [`fingerprint`] - Whole-graph traversal ([`TargetFingerprinter`])
//!
//! # Fingerprint Composition
//!
//! For a target `T` the bytes fed to SHA-256 are, in order:
//!
//! 1. `T`'s attribute bytes
//! 2. the seed digests, sorted by seed path
//! 3. each source reference's resolved digest, in declared order
//! 4. each dependency's fingerprint, ordered by dependency label
//!
//! Declared dependency order therefore never affects the result, while declared source
//! order does.

pub mod digest;
pub mod filesystem;
pub mod fingerprint;

pub use digest::{SourceDigester, SourceFileTarget};
pub use filesystem::{EntryKind, Filesystem, MemoryFilesystem, OsFilesystem};
pub use fingerprint::{FingerprintOptions, TargetFingerprinter};

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A 32-byte SHA-256 target fingerprint.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Wraps raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:02x}{:02x}{:02x}{:02x}..)", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

impl FromStr for Fingerprint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| format!("invalid fingerprint '{s}': {e}"))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| format!("fingerprint must be 32 bytes, got {}", v.len()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Label-to-fingerprint mapping for one revision, ordered by label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FingerprintMap(BTreeMap<String, Fingerprint>);

impl FingerprintMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a fingerprint, returning the previous value for the label.
    pub fn insert(&mut self, label: impl Into<String>, fingerprint: Fingerprint) -> Option<Fingerprint> {
        self.0.insert(label.into(), fingerprint)
    }

    #[must_use]
    pub fn get(&self, label: &str) -> Option<&Fingerprint> {
        self.0.get(label)
    }

    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.0.contains_key(label)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over entries in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Fingerprint)> {
        self.0.iter()
    }

    /// Iterates over labels in order.
    pub fn labels(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

impl FromIterator<(String, Fingerprint)> for FingerprintMap {
    fn from_iter<I: IntoIterator<Item = (String, Fingerprint)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for FingerprintMap {
    type Item = (String, Fingerprint);
    type IntoIter = std::collections::btree_map::IntoIter<String, Fingerprint>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_display_and_parse() {
        let fp = Fingerprint::from_bytes([0xab; 32]);
        let hex = fp.to_string();
        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with("abab"));
        assert_eq!(hex.parse::<Fingerprint>().unwrap(), fp);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        let err = "abcd".parse::<Fingerprint>().unwrap_err();
        assert!(err.contains("32 bytes"));
        assert!("zz".parse::<Fingerprint>().is_err());
    }

    #[test]
    fn test_map_serializes_as_ordered_hex_object() {
        let mut map = FingerprintMap::new();
        map.insert("//b:b", Fingerprint::from_bytes([2; 32]));
        map.insert("//a:a", Fingerprint::from_bytes([1; 32]));

        let json = serde_json::to_string(&map).unwrap();
        let a = json.find("//a:a").unwrap();
        let b = json.find("//b:b").unwrap();
        assert!(a < b);
        assert!(json.contains(&"01".repeat(32)));

        let back: FingerprintMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
