//! Merge operation model
//!
//! One `MergeOperation` per invocation of the merge workflow. It is never
//! rolled back: items imported before a later failure stay imported.

use crate::models::MatchTier;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-item outcome of a merge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeItemOutcome {
    /// Brought into the current library (`new_id` is `None` in dry-run)
    Imported { new_id: Option<String> },
    /// An equivalent already exists in the current library
    SkippedDuplicate { existing_id: String, tier: MatchTier },
    /// The recorded file no longer exists on disk
    SkippedMissingFile,
    /// The import call failed or timed out
    Failed { reason: String },
}

/// Merge workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeState {
    Pending,
    Reported,
}

/// Outcome for one previous-library item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeItemRecord {
    pub item_id: String,
    pub name: String,
    pub outcome: MergeItemOutcome,
}

/// Aggregate merge counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeCounts {
    pub imported: usize,
    pub skipped_duplicate: usize,
    pub skipped_missing_file: usize,
    pub failed: usize,
}

impl MergeCounts {
    pub fn total(&self) -> usize {
        self.imported + self.skipped_duplicate + self.skipped_missing_file + self.failed
    }
}

/// Moving one library ("previous") into another ("current")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeOperation {
    pub previous_library: PathBuf,
    pub current_library: PathBuf,
    pub state: MergeState,
    pub items: Vec<MergeItemRecord>,
}

impl MergeOperation {
    pub fn new(previous_library: PathBuf, current_library: PathBuf) -> Self {
        Self {
            previous_library,
            current_library,
            state: MergeState::Pending,
            items: Vec::new(),
        }
    }

    pub fn record(&mut self, item_id: &str, name: &str, outcome: MergeItemOutcome) {
        self.items.push(MergeItemRecord {
            item_id: item_id.to_string(),
            name: name.to_string(),
            outcome,
        });
    }

    pub fn counts(&self) -> MergeCounts {
        let mut counts = MergeCounts::default();
        for record in &self.items {
            match record.outcome {
                MergeItemOutcome::Imported { .. } => counts.imported += 1,
                MergeItemOutcome::SkippedDuplicate { .. } => counts.skipped_duplicate += 1,
                MergeItemOutcome::SkippedMissingFile => counts.skipped_missing_file += 1,
                MergeItemOutcome::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }
}
