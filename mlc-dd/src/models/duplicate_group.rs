//! Duplicate group model
//!
//! Groups are built fresh on every run and never persisted except through the
//! run report.

use mlc_common::LibraryItem;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy that produced a duplicate group, ordered by confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    /// Identical content fingerprint (authoritative)
    Fingerprint,
    /// Composite string similarity on normalized names
    Fuzzy,
    /// Trigram Jaccard similarity (lowest confidence)
    Ngram,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Fingerprint => "fingerprint",
            MatchTier::Fuzzy => "fuzzy",
            MatchTier::Ngram => "ngram",
        }
    }

    /// Nominal confidence used to weight downstream review
    pub fn confidence(&self) -> f64 {
        match self {
            MatchTier::Fingerprint => 1.0,
            MatchTier::Fuzzy => 0.75,
            MatchTier::Ngram => 0.5,
        }
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of items judged to be copies of one logical asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub tier: MatchTier,
    /// Members in first-seen order (at least two)
    pub members: Vec<LibraryItem>,
    /// Lowest pairwise similarity among members (1.0 for the fingerprint tier)
    pub similarity: f64,
    /// Index into `members` of the item to keep, set by the quality scorer
    pub representative: Option<usize>,
    /// Quality score of the representative
    pub representative_score: Option<f64>,
}

impl DuplicateGroup {
    pub fn new(tier: MatchTier, members: Vec<LibraryItem>, similarity: f64) -> Self {
        Self {
            tier,
            members,
            similarity,
            representative: None,
            representative_score: None,
        }
    }

    pub fn representative(&self) -> Option<&LibraryItem> {
        self.representative.and_then(|i| self.members.get(i))
    }

    /// Every member except the representative
    ///
    /// Empty until a representative has been selected.
    pub fn redundant(&self) -> impl Iterator<Item = &LibraryItem> {
        let keep = self.representative;
        self.members
            .iter()
            .enumerate()
            .filter(move |(i, _)| keep.is_some() && Some(*i) != keep)
            .map(|(_, item)| item)
    }

    /// Bytes freed by removing every redundant member
    pub fn redundant_bytes(&self) -> u64 {
        self.redundant().map(|item| item.size).sum()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
