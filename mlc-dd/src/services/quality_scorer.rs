//! Representative selection
//!
//! **Score components:**
//! - Rich metadata (tempo, key, duration, performer, album): 0.4
//! - Modified within the recent window: 0.3
//! - File size at or above the size floor: 0.3
//!
//! Ties go to the larger file, then the newer modification time, then the
//! member seen first.

use crate::config::QualityConfig;
use crate::models::DuplicateGroup;
use chrono::{DateTime, Duration, Utc};
use mlc_common::LibraryItem;
use std::cmp::Ordering;

const RICH_METADATA_WEIGHT: f64 = 0.4;
const RECENCY_WEIGHT: f64 = 0.3;
const SIZE_WEIGHT: f64 = 0.3;

/// Quality scorer
///
/// `now` is fixed at construction so every score in a run shares one
/// reference time.
#[derive(Debug, Clone)]
pub struct QualityScorer {
    recent_window: Duration,
    size_floor_bytes: u64,
    now: DateTime<Utc>,
}

impl QualityScorer {
    pub fn new(config: &QualityConfig, now: DateTime<Utc>) -> Self {
        Self {
            recent_window: Duration::days(config.recent_window_days),
            size_floor_bytes: config.size_floor_bytes,
            now,
        }
    }

    /// Score in [0, 1]
    pub fn score(&self, item: &LibraryItem) -> f64 {
        let mut score = 0.0;
        if item.metadata.is_rich() {
            score += RICH_METADATA_WEIGHT;
        }
        if self.now - item.modified_at <= self.recent_window {
            score += RECENCY_WEIGHT;
        }
        if item.size >= self.size_floor_bytes {
            score += SIZE_WEIGHT;
        }
        score
    }

    fn compare(&self, a: &LibraryItem, b: &LibraryItem) -> Ordering {
        self.score(a)
            .total_cmp(&self.score(b))
            .then_with(|| a.size.cmp(&b.size))
            .then_with(|| a.modified_at.cmp(&b.modified_at))
    }

    /// Index of the member to keep; `None` for an empty group
    pub fn select_index(&self, group: &DuplicateGroup) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, member) in group.members.iter().enumerate() {
            match best {
                Some(b) if self.compare(member, &group.members[b]) != Ordering::Greater => {}
                _ => best = Some(i),
            }
        }
        best
    }

    /// Select and record the representative of a group
    pub fn select_representative<'g>(&self, group: &'g mut DuplicateGroup) -> Option<&'g LibraryItem> {
        let index = self.mark(group)?;
        group.members.get(index)
    }

    fn mark(&self, group: &mut DuplicateGroup) -> Option<usize> {
        let index = self.select_index(group)?;
        group.representative = Some(index);
        group.representative_score = Some(self.score(&group.members[index]));
        Some(index)
    }

    /// Select representatives for every group
    pub fn assign(&self, groups: &mut [DuplicateGroup]) {
        for group in groups.iter_mut() {
            if let Some(index) = self.mark(group) {
                tracing::debug!(
                    tier = %group.tier,
                    keep = %group.members[index].id,
                    members = group.members.len(),
                    "Representative selected"
                );
            }
        }
    }
}
