//! Duplicate resolution (dedup mode)
//!
//! **Sequence:**
//! 1. List the active library
//! 2. Recover missing fingerprints from embedded metadata
//! 3. Coverage gate (abort before any mutation when it fails and is required;
//!    an opted-out failure still disables cleanup)
//! 4. Three-tier grouping
//! 5. Representative selection
//! 6. Cleanup: planned only (dry-run / no cleanup) or trash per redundant item
//! 7. Report
//!
//! State: `Planned → Reported` for dry-runs, `Planned → Cleaned → Reported`
//! for live runs.

use crate::clients::MediaLibrary;
use crate::config::{EngineConfig, ExecutionConfig};
use crate::error::{EngineError, EngineResult};
use crate::models::{CleanupItemOutcome, CleanupRecord, DuplicateGroup, ResolutionOutcome, ResolutionState};
use crate::services::{
    build_report, resolve_from_metadata, CoverageGate, CoverageResult, QualityScorer, Report,
    RunContext, SimilarityMatcher,
};
use chrono::{DateTime, Utc};
use mlc_common::LibraryItem;
use std::sync::Arc;

/// Runs dedup end to end against one library
pub struct ResolutionExecutor {
    library: Arc<dyn MediaLibrary>,
    matcher: SimilarityMatcher,
    gate: CoverageGate,
    scorer: QualityScorer,
    execution: ExecutionConfig,
}

impl ResolutionExecutor {
    pub fn new(library: Arc<dyn MediaLibrary>, config: &EngineConfig, now: DateTime<Utc>) -> Self {
        Self {
            library,
            matcher: SimilarityMatcher::new(&config.matching),
            gate: CoverageGate::new(&config.coverage),
            scorer: QualityScorer::new(&config.quality, now),
            execution: config.execution.clone(),
        }
    }

    pub async fn run(&self, context: &RunContext) -> EngineResult<Report> {
        let mut items = self.library.list_items().await?;
        resolve_from_metadata(&mut items);

        let coverage = enforce_coverage(&self.gate, &items)?;
        let groups = self.plan(&items);
        let execution = gated_execution(&self.execution, &coverage);
        let mut outcome = cleanup_groups(self.library.as_ref(), &groups, &execution).await;
        outcome.state = ResolutionState::Reported;

        let report = build_report(context, items.len(), &groups, &outcome).with_coverage(coverage);
        tracing::info!(
            groups = report.groups_by_tier.total(),
            redundant = report.redundant_items,
            trashed = report.cleanup.trashed,
            failed = report.cleanup.failed,
            dry_run = self.execution.dry_run,
            "Dedup complete"
        );
        Ok(report)
    }

    /// Group and select representatives without touching the library
    pub fn plan(&self, items: &[LibraryItem]) -> Vec<DuplicateGroup> {
        let mut groups = self.matcher.find_duplicate_groups(items);
        self.scorer.assign(&mut groups);
        groups
    }
}

/// Check coverage, turning a required failure into a run-level error
pub(crate) fn enforce_coverage(
    gate: &CoverageGate,
    items: &[LibraryItem],
) -> EngineResult<CoverageResult> {
    let coverage = gate.check_coverage(items);
    if !coverage.passed {
        if gate.is_required() {
            tracing::error!(
                ratio = coverage.ratio,
                missing = coverage.items_missing.len(),
                "Fingerprint coverage too low; run fp-sync first"
            );
            return Err(EngineError::Coverage(coverage));
        }
        tracing::warn!(
            ratio = coverage.ratio,
            missing = coverage.items_missing.len(),
            "Fingerprint coverage below minimum; continuing without cleanup"
        );
    }
    Ok(coverage)
}

/// Execution settings for the cleanup step: trashing needs a passed gate
pub(crate) fn gated_execution(execution: &ExecutionConfig, coverage: &CoverageResult) -> ExecutionConfig {
    let mut execution = execution.clone();
    if execution.cleanup && !coverage.passed {
        tracing::warn!(ratio = coverage.ratio, "Cleanup disabled: fingerprint coverage below minimum");
        execution.cleanup = false;
    }
    execution
}

/// Act on every redundant member of every group
///
/// Live runs with cleanup enabled move each redundant item to the library
/// trash, one call per item. A rejected or failed call is recorded for that
/// item and the batch continues. Otherwise every item is recorded as planned.
pub async fn cleanup_groups(
    library: &dyn MediaLibrary,
    groups: &[DuplicateGroup],
    execution: &ExecutionConfig,
) -> ResolutionOutcome {
    let live = !execution.dry_run && execution.cleanup;
    let mut outcome = ResolutionOutcome::planned(execution.dry_run);

    for (group_index, group) in groups.iter().enumerate() {
        for member in group.redundant() {
            let result = if live {
                trash_one(library, member).await
            } else {
                CleanupItemOutcome::Planned
            };
            outcome.items.push(CleanupRecord {
                item_id: member.id.clone(),
                group_index,
                size: member.size,
                outcome: result,
            });
        }
    }

    if live {
        outcome.state = ResolutionState::Cleaned;
    }
    outcome
}

async fn trash_one(library: &dyn MediaLibrary, item: &LibraryItem) -> CleanupItemOutcome {
    match library.move_to_trash(std::slice::from_ref(&item.id)).await {
        Ok(true) => {
            tracing::debug!(item_id = %item.id, name = %item.name, "Moved to trash");
            CleanupItemOutcome::Trashed
        }
        Ok(false) => {
            tracing::warn!(item_id = %item.id, "Trash move rejected");
            CleanupItemOutcome::Failed {
                reason: "rejected by library".to_string(),
            }
        }
        Err(e) => {
            tracing::warn!(item_id = %item.id, error = %e, "Trash move failed");
            CleanupItemOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}
