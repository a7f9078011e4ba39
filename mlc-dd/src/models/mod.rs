//! Data models for mlc-dd

pub mod duplicate_group;
pub mod fp_sync;
pub mod merge_operation;
pub mod resolution;

pub use duplicate_group::{DuplicateGroup, MatchTier};
pub use fp_sync::{
    FingerprintSource, FpSyncCounts, FpSyncItemOutcome, FpSyncOutcome, FpSyncRecord, SyncActions,
};
pub use merge_operation::{MergeCounts, MergeItemOutcome, MergeItemRecord, MergeOperation, MergeState};
pub use resolution::{
    CleanupCounts, CleanupItemOutcome, CleanupRecord, ResolutionOutcome, ResolutionState,
    RunMode,
};
