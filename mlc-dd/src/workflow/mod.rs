//! Engine workflows, one per run mode
//!
//! Each workflow owns its services, built from one `EngineConfig`, and talks
//! to the library only through `MediaLibrary`. Calls are awaited one at a
//! time.

pub mod dedup;
pub mod fp_sync;
pub mod merge;

pub use dedup::{cleanup_groups, ResolutionExecutor};
pub use fp_sync::FpSyncWorkflow;
pub use merge::MergeWorkflow;
