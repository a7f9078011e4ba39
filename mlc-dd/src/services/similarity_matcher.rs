//! Three-tier duplicate matcher
//!
//! **Tiers (in order):**
//! 1. Fingerprint: identical content fingerprints, authoritative
//! 2. Fuzzy: composite string score on normalized titles
//! 3. N-gram: trigram Jaccard on normalized titles, lowest confidence
//!
//! Later tiers only see items left ungrouped by earlier ones. Within the name
//! tiers a candidate joins a group only when it matches every current member
//! (complete linkage), so A~B and B~C never pull A and C together.
//!
//! Name comparisons only visit candidates that can still pass the tier:
//! - fuzzy: titles within the length ratio the composite threshold allows
//! - n-gram: titles sharing at least one trigram (inverted index)

use crate::config::MatchingConfig;
use crate::models::{DuplicateGroup, MatchTier};
use crate::services::name_similarity::{
    artist_tokens, artists_agree, composite_score, jaccard, normalize_name, split_artist_title,
    trigrams, PARTIAL_WEIGHT, RATIO_WEIGHT, TOKEN_SORT_WEIGHT,
};
use mlc_common::{Fingerprint, LibraryItem};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Comparison key derived once per item
#[derive(Debug, Clone, PartialEq)]
pub struct MatchKey {
    /// Normalized title
    pub title: String,
    /// Title length in characters
    pub len: usize,
    /// Sorted artist tokens, when an artist is derivable
    pub artist: Option<Vec<String>>,
    pub grams: HashSet<String>,
}

impl MatchKey {
    /// Derive the key; `None` when the name normalizes to nothing
    ///
    /// Artist comes from the `artist:` metadata, else from an
    /// "Artist - Title" display name. When the name carries the artist, only
    /// the title part is compared.
    pub fn from_item(item: &LibraryItem) -> Option<Self> {
        let split = split_artist_title(&item.name);
        let (artist, title) = match (item.metadata.artist.as_deref(), split) {
            (Some(meta), Some((named, title))) if artist_tokens(named) == artist_tokens(meta) => {
                (Some(meta), title)
            }
            (Some(meta), _) => (Some(meta), item.name.as_str()),
            (None, Some((named, title))) => (Some(named), title),
            (None, None) => (None, item.name.as_str()),
        };

        let title = normalize_name(title);
        if title.is_empty() {
            return None;
        }
        let artist = artist.map(artist_tokens).filter(|tokens| !tokens.is_empty());
        let grams = trigrams(&title);
        let len = title.chars().count();

        Some(Self { title, len, artist, grams })
    }
}

/// Inverted trigram index over positions in a key list
#[derive(Debug, Default)]
struct TrigramIndex {
    postings: HashMap<String, Vec<usize>>,
}

impl TrigramIndex {
    fn insert(&mut self, position: usize, key: &MatchKey) {
        for gram in &key.grams {
            self.postings.entry(gram.clone()).or_default().push(position);
        }
    }

    /// Positions sharing at least one trigram with `key`, ascending
    fn candidates(&self, key: &MatchKey) -> BTreeSet<usize> {
        key.grams
            .iter()
            .filter_map(|gram| self.postings.get(gram))
            .flatten()
            .copied()
            .collect()
    }
}

/// Positions bucketed by title length
#[derive(Debug, Default)]
struct LengthIndex {
    by_len: BTreeMap<usize, Vec<usize>>,
}

impl LengthIndex {
    fn insert(&mut self, position: usize, key: &MatchKey) {
        self.by_len.entry(key.len).or_default().push(position);
    }

    /// Positions whose title length is within `min_ratio` of `key`'s, ascending
    ///
    /// Levenshtein distance is at least the length difference, so the
    /// whole-string and token-sorted ratios are capped by shorter/longer.
    fn candidates(&self, key: &MatchKey, min_ratio: f64) -> BTreeSet<usize> {
        let (low, high) = if min_ratio > 0.0 {
            let low = (key.len as f64 * min_ratio).floor() as usize;
            let high = (key.len as f64 / min_ratio).ceil() as usize;
            (low, high)
        } else {
            (0, usize::MAX)
        };
        self.by_len
            .range(low..=high)
            .flat_map(|(_, positions)| positions.iter().copied())
            .collect()
    }
}

/// Candidate lookup for both name tiers
#[derive(Debug, Default)]
struct CandidateIndex {
    grams: TrigramIndex,
    lengths: LengthIndex,
}

impl CandidateIndex {
    fn insert(&mut self, position: usize, key: &MatchKey) {
        self.grams.insert(position, key);
        self.lengths.insert(position, key);
    }

    fn candidates(
        &self,
        matcher: &SimilarityMatcher,
        tier: MatchTier,
        key: &MatchKey,
    ) -> BTreeSet<usize> {
        match tier {
            MatchTier::Fingerprint => BTreeSet::new(),
            MatchTier::Fuzzy => self.lengths.candidates(key, matcher.fuzzy_min_length_ratio()),
            MatchTier::Ngram => self.grams.candidates(key),
        }
    }
}

/// A match for one candidate against an existing pool
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchHit<'a> {
    pub existing: &'a LibraryItem,
    pub tier: MatchTier,
    pub similarity: f64,
}

/// Duplicate matcher
#[derive(Debug, Clone)]
pub struct SimilarityMatcher {
    config: MatchingConfig,
}

impl SimilarityMatcher {
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn is_short(&self, key: &MatchKey) -> bool {
        key.len <= self.config.short_name_max_len
    }

    /// Smallest shorter/longer title length ratio that can reach the fuzzy threshold
    ///
    /// The composite is at most `PARTIAL_WEIGHT + (RATIO_WEIGHT + TOKEN_SORT_WEIGHT) * ratio`.
    fn fuzzy_min_length_ratio(&self) -> f64 {
        let ratio_weights = RATIO_WEIGHT + TOKEN_SORT_WEIGHT;
        ((self.config.min_similarity - PARTIAL_WEIGHT) / ratio_weights).clamp(0.0, 1.0)
    }

    fn artists_compatible(a: &MatchKey, b: &MatchKey) -> bool {
        match (&a.artist, &b.artist) {
            (Some(x), Some(y)) => artists_agree(x, y),
            _ => true,
        }
    }

    /// Fuzzy-tier similarity, `None` when the pair does not match
    pub fn fuzzy_similarity(&self, a: &MatchKey, b: &MatchKey) -> Option<f64> {
        if !Self::artists_compatible(a, b) {
            return None;
        }
        let score = composite_score(&a.title, &b.title);
        let threshold = if self.is_short(a) || self.is_short(b) {
            self.config.short_name_threshold.max(self.config.min_similarity)
        } else {
            self.config.min_similarity
        };
        (score >= threshold).then_some(score)
    }

    /// N-gram-tier similarity, `None` when the pair does not match
    pub fn ngram_similarity(&self, a: &MatchKey, b: &MatchKey) -> Option<f64> {
        if !Self::artists_compatible(a, b) {
            return None;
        }
        let score = jaccard(&a.grams, &b.grams);
        let passes = if self.is_short(a) || self.is_short(b) {
            score >= self.config.short_name_threshold
        } else {
            score > self.config.ngram_threshold
        };
        passes.then_some(score)
    }

    fn tier_similarity(&self, tier: MatchTier, a: &MatchKey, b: &MatchKey) -> Option<f64> {
        match tier {
            MatchTier::Fingerprint => None,
            MatchTier::Fuzzy => self.fuzzy_similarity(a, b),
            MatchTier::Ngram => self.ngram_similarity(a, b),
        }
    }

    /// Group an item set into duplicate groups
    ///
    /// Groups come out fingerprint tier first, then fuzzy, then n-gram; within
    /// a tier in order of their first member. Members keep input order.
    pub fn find_duplicate_groups(&self, items: &[LibraryItem]) -> Vec<DuplicateGroup> {
        let mut grouped = vec![false; items.len()];
        let mut groups = self.fingerprint_groups(items, &mut grouped);
        let fingerprint_groups = groups.len();

        let keys: Vec<Option<MatchKey>> = items
            .iter()
            .enumerate()
            .map(|(i, item)| if grouped[i] { None } else { MatchKey::from_item(item) })
            .collect();

        let mut index = CandidateIndex::default();
        for (position, key) in keys.iter().enumerate() {
            if let Some(key) = key {
                index.insert(position, key);
            }
        }

        for tier in [MatchTier::Fuzzy, MatchTier::Ngram] {
            for (members, similarity) in self.cluster(tier, &keys, &index, &mut grouped) {
                let group = DuplicateGroup::new(
                    tier,
                    members.iter().map(|&i| items[i].clone()).collect(),
                    similarity,
                );
                if tier == MatchTier::Ngram {
                    tracing::warn!(
                        members = ?group.members.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
                        similarity,
                        "Low-confidence n-gram group; review first"
                    );
                }
                groups.push(group);
            }
        }

        let count = |tier| groups.iter().filter(|g| g.tier == tier).count();
        tracing::info!(
            items = items.len(),
            fingerprint_groups,
            fuzzy_groups = count(MatchTier::Fuzzy),
            ngram_groups = count(MatchTier::Ngram),
            "Duplicate groups computed"
        );
        groups
    }

    fn fingerprint_groups(&self, items: &[LibraryItem], grouped: &mut [bool]) -> Vec<DuplicateGroup> {
        let mut order: Vec<&Fingerprint> = Vec::new();
        let mut by_fingerprint: HashMap<&Fingerprint, Vec<usize>> = HashMap::new();

        for (i, item) in items.iter().enumerate() {
            if let Some(fp) = &item.fingerprint {
                let members = by_fingerprint.entry(fp).or_default();
                if members.is_empty() {
                    order.push(fp);
                }
                members.push(i);
            }
        }

        let mut groups = Vec::new();
        for fp in order {
            let members = &by_fingerprint[fp];
            if members.len() < 2 {
                continue;
            }
            for &i in members {
                grouped[i] = true;
            }
            groups.push(DuplicateGroup::new(
                MatchTier::Fingerprint,
                members.iter().map(|&i| items[i].clone()).collect(),
                1.0,
            ));
        }
        groups
    }

    /// Complete-linkage clustering of ungrouped keys for one name tier
    fn cluster(
        &self,
        tier: MatchTier,
        keys: &[Option<MatchKey>],
        index: &CandidateIndex,
        grouped: &mut [bool],
    ) -> Vec<(Vec<usize>, f64)> {
        let mut clusters = Vec::new();

        for anchor in 0..keys.len() {
            if grouped[anchor] {
                continue;
            }
            let Some(anchor_key) = &keys[anchor] else {
                continue;
            };

            let mut members = vec![anchor];
            let mut min_similarity = 1.0f64;

            for candidate in index.candidates(self, tier, anchor_key).range(anchor + 1..) {
                let candidate = *candidate;
                if grouped[candidate] {
                    continue;
                }
                let Some(candidate_key) = &keys[candidate] else {
                    continue;
                };

                let mut lowest = 1.0f64;
                let matches_all = members.iter().all(|&member| {
                    let Some(member_key) = &keys[member] else {
                        return false;
                    };
                    match self.tier_similarity(tier, member_key, candidate_key) {
                        Some(score) => {
                            lowest = lowest.min(score);
                            true
                        }
                        None => false,
                    }
                });

                if matches_all {
                    members.push(candidate);
                    min_similarity = min_similarity.min(lowest);
                }
            }

            if members.len() >= 2 {
                for &member in &members {
                    grouped[member] = true;
                }
                clusters.push((members, min_similarity));
            }
        }
        clusters
    }

    /// Build a lookup pool for `find_match`
    pub fn pool(&self, items: Vec<LibraryItem>) -> MatchPool<'_> {
        let mut pool = MatchPool {
            matcher: self,
            items: Vec::with_capacity(items.len()),
            keys: Vec::with_capacity(items.len()),
            by_fingerprint: HashMap::new(),
            index: CandidateIndex::default(),
        };
        for item in items {
            pool.insert(item);
        }
        pool
    }
}

/// Indexed item set answering "does an equivalent already exist?"
pub struct MatchPool<'m> {
    matcher: &'m SimilarityMatcher,
    items: Vec<LibraryItem>,
    keys: Vec<Option<MatchKey>>,
    by_fingerprint: HashMap<Fingerprint, usize>,
    index: CandidateIndex,
}

impl<'m> MatchPool<'m> {
    pub fn insert(&mut self, item: LibraryItem) {
        let position = self.items.len();
        if let Some(fp) = &item.fingerprint {
            self.by_fingerprint.entry(fp.clone()).or_insert(position);
        }
        let key = MatchKey::from_item(&item);
        if let Some(key) = &key {
            self.index.insert(position, key);
        }
        self.keys.push(key);
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<LibraryItem> {
        self.items
    }

    /// Best existing equivalent of `candidate`, fingerprint tier first
    ///
    /// Within a name tier the highest-scoring pool item wins; ties go to the
    /// earliest pool item.
    pub fn find_match(&self, candidate: &LibraryItem) -> Option<MatchHit<'_>> {
        if let Some(&position) = candidate
            .fingerprint
            .as_ref()
            .and_then(|fp| self.by_fingerprint.get(fp))
        {
            return Some(MatchHit {
                existing: &self.items[position],
                tier: MatchTier::Fingerprint,
                similarity: 1.0,
            });
        }

        let key = MatchKey::from_item(candidate)?;

        for tier in [MatchTier::Fuzzy, MatchTier::Ngram] {
            let mut best: Option<(usize, f64)> = None;
            for position in self.index.candidates(self.matcher, tier, &key) {
                let Some(existing_key) = &self.keys[position] else {
                    continue;
                };
                if let Some(score) = self.matcher.tier_similarity(tier, existing_key, &key) {
                    if best.map_or(true, |(_, s)| score > s) {
                        best = Some((position, score));
                    }
                }
            }
            if let Some((position, similarity)) = best {
                return Some(MatchHit {
                    existing: &self.items[position],
                    tier,
                    similarity,
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const FP_A: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";
    const FP_B: &str = "60303ae22b998861bce3b28f33eec1be758a213c86c93c076dbe9f558c11c752";

    fn item(id: &str, name: &str) -> LibraryItem {
        item_with_tags(id, name, vec![])
    }

    fn item_with_tags(id: &str, name: &str, tags: Vec<&str>) -> LibraryItem {
        LibraryItem::new(
            id,
            name,
            "wav",
            1_000,
            Utc::now(),
            tags.into_iter().map(String::from).collect(),
            Some(format!("/lib/{id}.wav").into()),
        )
    }

    fn fp_tag(hex: &str) -> String {
        format!("fingerprint:{hex}")
    }

    fn matcher() -> SimilarityMatcher {
        SimilarityMatcher::new(&MatchingConfig::default())
    }

    fn ids(group: &DuplicateGroup) -> Vec<&str> {
        group.members.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn test_fingerprint_tier_groups_identical_content() {
        let a = fp_tag(FP_A);
        let b = fp_tag(FP_B);
        let items = vec![
            item_with_tags("1", "Completely Different", vec![&a]),
            item_with_tags("2", "Other Name", vec![&b]),
            item_with_tags("3", "Unrelated", vec![&a]),
        ];

        let groups = matcher().find_duplicate_groups(&items);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].tier, MatchTier::Fingerprint);
        assert_eq!(ids(&groups[0]), vec!["1", "3"]);
        assert_eq!(groups[0].similarity, 1.0);
    }

    #[test]
    fn test_fingerprint_groups_have_equal_fingerprints() {
        let a = fp_tag(FP_A);
        let b = fp_tag(FP_B);
        let items = vec![
            item_with_tags("1", "Sunrise", vec![&a]),
            item_with_tags("2", "Sunrise", vec![&b]),
            item_with_tags("3", "Sunrise", vec![&a]),
            item_with_tags("4", "Sunrise", vec![&b]),
        ];

        for group in matcher()
            .find_duplicate_groups(&items)
            .iter()
            .filter(|g| g.tier == MatchTier::Fingerprint)
        {
            let first = &group.members[0].fingerprint;
            assert!(group.members.iter().all(|m| &m.fingerprint == first));
        }
    }

    #[test]
    fn test_fuzzy_tier_groups_format_variants() {
        let items = vec![
            item("1", "Golden Hour"),
            item("2", "Golden Hour (WAV)"),
            item("3", "Silver Lining"),
        ];

        let groups = matcher().find_duplicate_groups(&items);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].tier, MatchTier::Fuzzy);
        assert_eq!(ids(&groups[0]), vec!["1", "2"]);
    }

    #[test]
    fn test_near_miss_forms_no_group() {
        let items = vec![item("1", "Morning Glow"), item("2", "Evening Glow")];
        assert!(matcher().find_duplicate_groups(&items).is_empty());
    }

    #[test]
    fn test_short_names_need_strict_score() {
        let m = matcher();
        let a = MatchKey::from_item(&item("1", "Track")).unwrap();
        let b = MatchKey::from_item(&item("2", "Tracy")).unwrap();

        let score = composite_score(&a.title, &b.title);
        assert!((0.75..0.90).contains(&score), "score was {score}");
        assert!(m.fuzzy_similarity(&a, &b).is_none());

        let items = vec![item("1", "Track"), item("2", "Tracy")];
        assert!(m.find_duplicate_groups(&items).is_empty());
    }

    #[test]
    fn test_artist_disagreement_rejected() {
        let items = vec![
            item("1", "Artist A - Sunrise"),
            item("2", "Artist B - Sunrise"),
        ];
        assert!(matcher().find_duplicate_groups(&items).is_empty());

        let tagged = vec![
            item_with_tags("1", "Sunrise", vec!["artist:Artist A"]),
            item_with_tags("2", "Sunrise", vec!["artist:Artist B"]),
        ];
        assert!(matcher().find_duplicate_groups(&tagged).is_empty());
    }

    #[test]
    fn test_one_sided_artist_does_not_block() {
        let items = vec![item("1", "Artist A - Sunrise Boulevard"), item("2", "Sunrise Boulevard")];
        let groups = matcher().find_duplicate_groups(&items);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].tier, MatchTier::Fuzzy);
    }

    #[test]
    fn test_title_words_resembling_formats_stay_distinct() {
        let pairs = [
            ("Heat Wave", "Heat"),
            ("Magnum Opus", "Magnum"),
            ("Puppet Master", "Puppet"),
            ("Hard Copy", "Hard"),
        ];
        for (long, short) in pairs {
            let items = vec![item("1", long), item("2", short)];
            assert!(
                matcher().find_duplicate_groups(&items).is_empty(),
                "{long} grouped with {short}"
            );
        }
    }

    #[test]
    fn test_fuzzy_match_without_shared_trigram() {
        let m = matcher();
        let a = MatchKey::from_item(&item("1", "abcdefgh")).unwrap();
        let b = MatchKey::from_item(&item("2", "abxdeygh")).unwrap();
        assert!(a.grams.is_disjoint(&b.grams));
        assert!(m.fuzzy_similarity(&a, &b).is_some());

        let items = vec![item("1", "abcdefgh"), item("2", "abxdeygh")];
        let groups = m.find_duplicate_groups(&items);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].tier, MatchTier::Fuzzy);

        let pool = m.pool(vec![item("1", "abcdefgh")]);
        assert_eq!(pool.find_match(&item("2", "abxdeygh")).unwrap().tier, MatchTier::Fuzzy);
    }

    #[test]
    fn test_length_bound_admits_every_fuzzy_match() {
        let m = matcher();
        let ratio = m.fuzzy_min_length_ratio();
        assert!((ratio - (0.75 - 0.3) / 0.7).abs() < 1e-9);

        let a = MatchKey::from_item(&item("1", "Deep Blue Sea")).unwrap();
        let b = MatchKey::from_item(&item("2", "Deep Blue Sea Live")).unwrap();
        assert!(m.fuzzy_similarity(&a, &b).is_some());
        assert!(a.len.min(b.len) as f64 / a.len.max(b.len) as f64 >= ratio);

        let mut index = LengthIndex::default();
        index.insert(0, &a);
        index.insert(1, &MatchKey::from_item(&item("3", "Sea")).unwrap());
        assert_eq!(index.candidates(&b, ratio), BTreeSet::from([0]));
    }

    #[test]
    fn test_no_transitive_chaining() {
        let m = matcher();
        let key = |name: &str| MatchKey::from_item(&item("x", name)).unwrap();
        let (a, b, c) = (key("Deep Blue Sea"), key("Deep Blue Sea Live"), key("Blue Sea Live"));
        assert!(m.fuzzy_similarity(&a, &b).is_some());
        assert!(m.fuzzy_similarity(&b, &c).is_some());
        assert!(m.fuzzy_similarity(&a, &c).is_none());
        assert!(m.ngram_similarity(&a, &c).is_none());

        let orders = [["A", "B", "C"], ["B", "A", "C"], ["B", "C", "A"], ["C", "B", "A"]];
        for order in orders {
            let items: Vec<LibraryItem> = order
                .iter()
                .map(|id| match *id {
                    "A" => item("A", "Deep Blue Sea"),
                    "B" => item("B", "Deep Blue Sea Live"),
                    _ => item("C", "Blue Sea Live"),
                })
                .collect();
            for group in m.find_duplicate_groups(&items) {
                let members = ids(&group);
                assert!(
                    !(members.contains(&"A") && members.contains(&"C")),
                    "order {:?} chained A and C",
                    order
                );
            }
        }
    }

    #[test]
    fn test_ngram_tier_is_last_resort() {
        let m = SimilarityMatcher::new(&MatchingConfig {
            min_similarity: 0.95,
            ..MatchingConfig::default()
        });
        let items = vec![item("1", "Night Drive"), item("2", "Night Drive VIP")];

        let groups = m.find_duplicate_groups(&items);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].tier, MatchTier::Ngram);
        assert!(groups[0].similarity > 0.60);
    }

    #[test]
    fn test_tiers_do_not_regroup_items() {
        let a = fp_tag(FP_A);
        let items = vec![
            item_with_tags("1", "Golden Hour", vec![&a]),
            item_with_tags("2", "Golden Hour", vec![&a]),
            item("3", "Golden Hours"),
        ];

        let groups = matcher().find_duplicate_groups(&items);
        assert_eq!(groups.len(), 1);
        assert_eq!(ids(&groups[0]), vec!["1", "2"]);
    }

    #[test]
    fn test_pool_prefers_fingerprint_match() {
        let a = fp_tag(FP_A);
        let m = matcher();
        let pool = m.pool(vec![
            item("1", "Golden Hour"),
            item_with_tags("2", "Renamed Upload", vec![&a]),
        ]);

        let candidate = item_with_tags("9", "Golden Hour", vec![&a]);
        let hit = pool.find_match(&candidate).unwrap();
        assert_eq!(hit.existing.id, "2");
        assert_eq!(hit.tier, MatchTier::Fingerprint);

        let by_name = pool.find_match(&item("8", "Golden Hour (copy)")).unwrap();
        assert_eq!(by_name.existing.id, "1");
        assert_eq!(by_name.tier, MatchTier::Fuzzy);

        assert!(pool.find_match(&item("7", "Morning Glow")).is_none());
    }

    #[test]
    fn test_pool_insert_extends_matches() {
        let m = matcher();
        let mut pool = m.pool(Vec::new());
        assert!(pool.find_match(&item("1", "Silver Lining")).is_none());

        pool.insert(item("1", "Silver Lining"));
        assert_eq!(pool.len(), 1);
        assert!(pool.find_match(&item("2", "silver_lining")).is_some());
    }
}
