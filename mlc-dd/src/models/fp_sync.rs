//! Fingerprint synchronization outcome model

use mlc_common::Fingerprint;
use serde::{Deserialize, Serialize};

/// Where an item's fingerprint came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintSource {
    /// Library `fingerprint:` tag
    Tag,
    /// File's own metadata container
    Metadata,
    /// Hashed from file bytes
    Computed,
}

/// Writes performed (live) or planned (dry-run) for one item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncActions {
    /// Fingerprint written into the file's metadata
    pub embed: bool,
    /// Library tag created or replaced
    pub tag: bool,
    /// Attached to the record database
    pub record: bool,
}

impl SyncActions {
    pub fn any(&self) -> bool {
        self.embed || self.tag || self.record
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FpSyncItemOutcome {
    Synced {
        source: FingerprintSource,
        fingerprint: Fingerprint,
        actions: SyncActions,
    },
    /// No file to read (URL-only, missing on disk, empty)
    Skipped { reason: String },
    /// Read or write failure
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FpSyncRecord {
    pub item_id: String,
    pub name: String,
    #[serde(flatten)]
    pub outcome: FpSyncItemOutcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FpSyncCounts {
    /// Tag present and nothing else to write
    pub already_synced: usize,
    pub computed: usize,
    pub embedded: usize,
    pub tagged: usize,
    pub recorded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Result of one fp-sync run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FpSyncOutcome {
    pub items: Vec<FpSyncRecord>,
}

impl FpSyncOutcome {
    pub fn record(&mut self, item_id: &str, name: &str, outcome: FpSyncItemOutcome) {
        self.items.push(FpSyncRecord {
            item_id: item_id.to_string(),
            name: name.to_string(),
            outcome,
        });
    }

    pub fn counts(&self) -> FpSyncCounts {
        let mut counts = FpSyncCounts::default();
        for record in &self.items {
            match &record.outcome {
                FpSyncItemOutcome::Synced { source, actions, .. } => {
                    if *source == FingerprintSource::Tag && !actions.any() {
                        counts.already_synced += 1;
                    }
                    if *source == FingerprintSource::Computed {
                        counts.computed += 1;
                    }
                    counts.embedded += usize::from(actions.embed);
                    counts.tagged += usize::from(actions.tag);
                    counts.recorded += usize::from(actions.record);
                }
                FpSyncItemOutcome::Skipped { .. } => counts.skipped += 1,
                FpSyncItemOutcome::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }
}
