//! Shared vocabulary for git-remote-ark.
//!
//! A commit hash, a bundle name built from a pair of hashes, the
//! chain-contiguous manifest those names form, and the repository metadata
//! record carried opaquely through the lock primitive. None of these types
//! know about git, a blob store, or a KV store — they are pure data plus the
//! invariants spec.md §3 and §8 hang off them.

pub mod error;

pub use error::{
    ArkError, ArkResult, ConfigError, CryptoError, LockError, PolicyError, StoreError, VcsError,
};


use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The two hash lengths git supports: SHA-1 (40 hex chars) and SHA-256 (64).
pub const SHA1_HEX_LEN: usize = 40;
pub const SHA256_HEX_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashParseError {
    #[error("hash `{0}` is not valid hex")]
    NotHex(String),
    #[error("hash has {0} hex chars, expected 40 or 64")]
    BadLength(usize),
}

/// A commit hash: 40 or 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitHash(String);

impl CommitHash {
    /// The all-zeros hash of the given length (40 or 64).
    pub fn zero(len: usize) -> Self {
        debug_assert!(len == SHA1_HEX_LEN || len == SHA256_HEX_LEN);
        Self("0".repeat(len))
    }

    pub fn is_zero(&self) -> bool {
        self.0.bytes().all(|b| b == b'0')
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CommitHash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != SHA1_HEX_LEN && s.len() != SHA256_HEX_LEN {
            return Err(HashParseError::BadLength(s.len()));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(HashParseError::NotHex(s.to_string()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BundleNameParseError {
    #[error("bundle name `{0}` is missing the `..` separator")]
    MissingSeparator(String),
    #[error("bundle name start hash invalid: {0}")]
    Start(#[source] HashParseError),
    #[error("bundle name end hash invalid: {0}")]
    End(#[source] HashParseError),
    #[error("bundle name mixes hash lengths: start has {start_len}, end has {end_len}")]
    MixedLength { start_len: usize, end_len: usize },
}

/// `"{start}..{end}"`. `start` is the all-zeros hash for the first bundle in
/// a prefix; for every later bundle it is the `end` of its predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct BundleName {
    pub start: CommitHash,
    pub end: CommitHash,
}

impl BundleName {
    pub fn new(start: CommitHash, end: CommitHash) -> Result<Self, BundleNameParseError> {
        if start.len() != end.len() {
            return Err(BundleNameParseError::MixedLength {
                start_len: start.len(),
                end_len: end.len(),
            });
        }
        Ok(Self { start, end })
    }

    /// The initial bundle for a fresh prefix: `{zero}..{tip}`.
    pub fn initial(tip: CommitHash) -> Self {
        let zero = CommitHash::zero(tip.len());
        Self { start: zero, end: tip }
    }

    pub fn is_initial(&self) -> bool {
        self.start.is_zero()
    }
}

impl fmt::Display for BundleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl FromStr for BundleName {
    type Err = BundleNameParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once("..")
            .ok_or_else(|| BundleNameParseError::MissingSeparator(s.to_string()))?;
        let start: CommitHash = start.parse().map_err(BundleNameParseError::Start)?;
        let end: CommitHash = end.parse().map_err(BundleNameParseError::End)?;
        Self::new(start, end)
    }
}

impl From<BundleName> for String {
    fn from(b: BundleName) -> Self {
        b.to_string()
    }
}

impl TryFrom<String> for BundleName {
    type Error = BundleNameParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("entry {index} ({entry}) is not chain-contiguous with its predecessor ({prev})")]
    NotContiguous {
        index: usize,
        entry: BundleName,
        prev: BundleName,
    },
    #[error("first entry {0} must start at the zero hash")]
    FirstNotInitial(BundleName),
    #[error("entry parse error: {0}")]
    Parse(#[from] BundleNameParseError),
}

/// An ordered, chain-contiguous list of bundle names: oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest(Vec<BundleName>);

impl Manifest {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Parse the newline-joined wire format (§3, §4.4). Blank lines are
    /// dropped, matching the original tool's `strings.Split` + filter.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let entries = text
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| l.parse::<BundleName>())
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_entries(entries)
    }

    pub fn from_entries(entries: Vec<BundleName>) -> Result<Self, ManifestError> {
        if let Some(first) = entries.first()
            && !first.is_initial()
        {
            return Err(ManifestError::FirstNotInitial(first.clone()));
        }
        for (i, pair) in entries.windows(2).enumerate() {
            let (prev, entry) = (&pair[0], &pair[1]);
            if prev.end != entry.start {
                return Err(ManifestError::NotContiguous {
                    index: i + 1,
                    entry: entry.clone(),
                    prev: prev.clone(),
                });
            }
        }
        Ok(Self(entries))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BundleName> {
        self.0.iter()
    }

    pub fn last(&self) -> Option<&BundleName> {
        self.0.last()
    }

    /// Append a bundle, verifying it continues the chain.
    pub fn appended(&self, name: BundleName) -> Result<Self, ManifestError> {
        let mut entries = self.0.clone();
        if let Some(last) = entries.last()
            && last.end != name.start
        {
            return Err(ManifestError::NotContiguous {
                index: entries.len(),
                entry: name,
                prev: last.clone(),
            });
        }
        if entries.is_empty() && !name.is_initial() {
            return Err(ManifestError::FirstNotInitial(name));
        }
        entries.push(name);
        Ok(Self(entries))
    }

    /// The newline-joined wire format written to the manifest blob.
    pub fn to_wire(&self) -> String {
        self.0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl IntoIterator for Manifest {
    type Item = BundleName;
    type IntoIter = std::vec::IntoIter<BundleName>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// The business fields of the repository metadata record (spec.md §3). This
/// type never carries the lease primitive's own bookkeeping (holder id,
/// expiry) — see the Design Notes on "lock payload conflation": those stay
/// inside `ark-lock`, opaque to this type and everything above it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMetadata {
    /// Current manifest key, e.g. `prefix/bundles_<tip>`. Empty before the
    /// first successful push.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundles: Option<String>,
    /// The one permitted branch name. Empty before the first successful push.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl RepoMetadata {
    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// An empty/absent KV item deserializes to the default record (both
    /// fields empty), matching the original's zero-value `RepoMeta`.
    pub fn from_payload(bytes: &[u8]) -> serde_json::Result<Self> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn zero_hash_lengths() {
        assert_eq!(CommitHash::zero(40).as_str(), "0".repeat(40));
        assert_eq!(CommitHash::zero(64).as_str(), "0".repeat(64));
    }

    #[test]
    fn bundle_name_roundtrip() {
        let n: BundleName = "0000000000000000000000000000000000000000..2179a6fcb6b47819cd97e8fa0c1723a9e7221988"
            .parse()
            .unwrap();
        assert!(n.is_initial());
        assert_eq!(n.to_string(), "0000000000000000000000000000000000000000..2179a6fcb6b47819cd97e8fa0c1723a9e7221988");
    }

    #[test]
    fn bundle_name_rejects_mixed_lengths() {
        let a: CommitHash = "0".repeat(40).parse().unwrap();
        let b: CommitHash = "1".repeat(64).parse().unwrap();
        assert!(BundleName::new(a, b).is_err());
    }

    #[test]
    fn manifest_requires_initial_first_entry() {
        let a: CommitHash = "1".repeat(40).parse().unwrap();
        let b: CommitHash = "2".repeat(40).parse().unwrap();
        let entries = vec![BundleName::new(a, b).unwrap()];
        assert!(matches!(
            Manifest::from_entries(entries),
            Err(ManifestError::FirstNotInitial(_))
        ));
    }

    #[test]
    fn manifest_detects_gap() {
        let z = CommitHash::zero(40);
        let a: CommitHash = "1".repeat(40).parse().unwrap();
        let b: CommitHash = "2".repeat(40).parse().unwrap();
        let c: CommitHash = "3".repeat(40).parse().unwrap();
        let entries = vec![
            BundleName::new(z, a).unwrap(),
            BundleName::new(b, c).unwrap(),
        ];
        assert!(matches!(
            Manifest::from_entries(entries),
            Err(ManifestError::NotContiguous { .. })
        ));
    }

    #[test]
    fn manifest_wire_roundtrip() {
        let z = CommitHash::zero(40);
        let a: CommitHash = "2179a6fcb6b47819cd97e8fa0c1723a9e7221988".parse().unwrap();
        let b: CommitHash = "5147bba478721d4569ae366ae9c70227e7036f9c".parse().unwrap();
        let m = Manifest::from_entries(vec![
            BundleName::new(z.clone(), a.clone()).unwrap(),
            BundleName::new(a, b).unwrap(),
        ])
        .unwrap();
        let wire = m.to_wire();
        let parsed = Manifest::parse(&wire).unwrap();
        assert_eq!(m, parsed);
    }

    #[test]
    fn manifest_parse_drops_blank_lines() {
        let wire = "0000000000000000000000000000000000000000..2179a6fcb6b47819cd97e8fa0c1723a9e7221988\n\n";
        let m = Manifest::parse(wire).unwrap();
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn repo_metadata_absent_payload_is_default() {
        let m = RepoMetadata::from_payload(&[]).unwrap();
        assert_eq!(m, RepoMetadata::default());
    }

    proptest! {
        #[test]
        fn hash_roundtrips_through_display(s in "[0-9a-f]{40}") {
            let h: CommitHash = s.parse().unwrap();
            prop_assert_eq!(h.to_string(), s);
        }

        #[test]
        fn appended_chain_always_contiguous(n in 1usize..6) {
            let mut m = Manifest::empty();
            let mut prev = CommitHash::zero(40);
            for i in 0..n {
                let next: CommitHash = format!("{:040x}", i + 1).parse().unwrap();
                let name = BundleName::new(prev.clone(), next.clone()).unwrap();
                m = m.appended(name).unwrap();
                prev = next;
            }
            prop_assert_eq!(m.len(), n);
        }
    }
}
