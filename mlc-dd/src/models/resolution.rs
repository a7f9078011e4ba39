//! Resolution outcome model (cleanup side of the executor)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Engine mode selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    Dedup,
    Merge,
    FpSync,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Dedup => "dedup",
            RunMode::Merge => "merge",
            RunMode::FpSync => "fp-sync",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cleanup state machine: `Planned → Reported` (dry-run) or
/// `Planned → Cleaned → Reported` (live)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionState {
    Planned,
    Cleaned,
    Reported,
}

/// What happened to one redundant item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CleanupItemOutcome {
    /// Dry-run, or live without cleanup enabled: would be trashed
    Planned,
    /// Moved to the library trash
    Trashed,
    /// Trash move rejected or timed out
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupRecord {
    pub item_id: String,
    pub group_index: usize,
    pub size: u64,
    pub outcome: CleanupItemOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupCounts {
    /// Redundant items the run acted on (or would act on)
    pub attempted: usize,
    pub trashed: usize,
    pub failed: usize,
    pub bytes_reclaimed: u64,
}

/// Result of the cleanup half of the resolution executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    pub dry_run: bool,
    pub state: ResolutionState,
    pub items: Vec<CleanupRecord>,
}

impl ResolutionOutcome {
    pub fn planned(dry_run: bool) -> Self {
        Self {
            dry_run,
            state: ResolutionState::Planned,
            items: Vec::new(),
        }
    }

    pub fn counts(&self) -> CleanupCounts {
        let mut counts = CleanupCounts {
            attempted: self.items.len(),
            ..Default::default()
        };
        for record in &self.items {
            match record.outcome {
                CleanupItemOutcome::Trashed => {
                    counts.trashed += 1;
                    counts.bytes_reclaimed += record.size;
                }
                CleanupItemOutcome::Failed { .. } => counts.failed += 1,
                CleanupItemOutcome::Planned => {}
            }
        }
        counts
    }
}
