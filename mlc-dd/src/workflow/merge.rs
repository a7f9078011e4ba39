//! Library merge (merge mode)
//!
//! Brings every item of a previous library into the current one, skipping
//! items already present and items whose file is gone. After the imports a
//! second grouping pass over the merged set catches duplicates that slipped
//! through.
//!
//! Imports are never rolled back.

use crate::clients::{ImportRequest, MediaLibrary};
use crate::config::{EngineConfig, ExecutionConfig};
use crate::error::{EngineError, EngineResult};
use crate::models::{MergeItemOutcome, MergeOperation, MergeState, ResolutionState};
use crate::services::{
    build_report, resolve_from_metadata, CoverageGate, MatchPool, QualityScorer, Report,
    RunContext, SimilarityMatcher,
};
use crate::workflow::dedup::{cleanup_groups, enforce_coverage, gated_execution};
use chrono::{DateTime, Utc};
use mlc_common::LibraryItem;
use std::path::Path;
use std::sync::Arc;

pub struct MergeWorkflow {
    library: Arc<dyn MediaLibrary>,
    matcher: SimilarityMatcher,
    gate: CoverageGate,
    scorer: QualityScorer,
    execution: ExecutionConfig,
}

impl MergeWorkflow {
    pub fn new(library: Arc<dyn MediaLibrary>, config: &EngineConfig, now: DateTime<Utc>) -> Self {
        Self {
            library,
            matcher: SimilarityMatcher::new(&config.matching),
            gate: CoverageGate::new(&config.coverage),
            scorer: QualityScorer::new(&config.quality, now),
            execution: config.execution.clone(),
        }
    }

    pub async fn run(&self, context: &RunContext, previous_library: &Path) -> EngineResult<Report> {
        let current_library = self.library.library_path().await?;
        if !previous_library.is_dir() {
            return Err(EngineError::Setup(format!(
                "Previous library not found: {}",
                previous_library.display()
            )));
        }
        if previous_library == current_library {
            return Err(EngineError::Setup(
                "Previous library is the active library".to_string(),
            ));
        }

        let mut previous_items = self.list_previous(previous_library, &current_library).await?;
        let mut current_items = self.library.list_items().await?;
        resolve_from_metadata(&mut previous_items);
        resolve_from_metadata(&mut current_items);
        let scanned = previous_items.len() + current_items.len();

        tracing::info!(
            previous = previous_items.len(),
            current = current_items.len(),
            dry_run = self.execution.dry_run,
            "Merging libraries"
        );

        let union: Vec<LibraryItem> = previous_items.iter().chain(&current_items).cloned().collect();
        let coverage = enforce_coverage(&self.gate, &union)?;
        drop(union);

        let mut operation = MergeOperation::new(previous_library.to_path_buf(), current_library);
        let mut pool = self.matcher.pool(current_items);

        for item in &previous_items {
            let outcome = self.merge_one(item, &mut pool).await;
            operation.record(&item.id, &item.file_name(), outcome);
        }
        operation.state = MergeState::Reported;

        let counts = operation.counts();
        tracing::info!(
            imported = counts.imported,
            skipped_duplicate = counts.skipped_duplicate,
            skipped_missing_file = counts.skipped_missing_file,
            failed = counts.failed,
            "Imports complete"
        );

        // Second pass over the merged set
        let merged = if self.execution.dry_run {
            pool.into_items()
        } else {
            let mut relisted = self.library.list_items().await?;
            resolve_from_metadata(&mut relisted);
            relisted
        };
        let mut groups = self.matcher.find_duplicate_groups(&merged);
        self.scorer.assign(&mut groups);
        if !groups.is_empty() {
            tracing::warn!(groups = groups.len(), "Duplicates present after merge");
        }

        let execution = gated_execution(&self.execution, &coverage);
        let mut outcome = cleanup_groups(self.library.as_ref(), &groups, &execution).await;
        outcome.state = ResolutionState::Reported;

        Ok(build_report(context, scanned, &groups, &outcome)
            .with_coverage(coverage)
            .with_merge(operation))
    }

    /// List the previous library, always switching back to the current one
    async fn list_previous(
        &self,
        previous_library: &Path,
        current_library: &Path,
    ) -> EngineResult<Vec<LibraryItem>> {
        if !self.library.switch_library(previous_library).await? {
            return Err(EngineError::Setup(format!(
                "Library refused to switch to {}",
                previous_library.display()
            )));
        }

        let listed = self.library.list_items().await;

        let switched_back = self.library.switch_library(current_library).await?;
        if !switched_back {
            return Err(EngineError::Setup(format!(
                "Library refused to switch back to {}",
                current_library.display()
            )));
        }

        Ok(listed?)
    }

    async fn merge_one(&self, item: &LibraryItem, pool: &mut MatchPool<'_>) -> MergeItemOutcome {
        let Some(path) = item.path().filter(|p| p.is_file()) else {
            tracing::debug!(item_id = %item.id, "Recorded file missing; skipping");
            return MergeItemOutcome::SkippedMissingFile;
        };

        if let Some(hit) = pool.find_match(item) {
            tracing::debug!(
                item_id = %item.id,
                existing_id = %hit.existing.id,
                tier = %hit.tier,
                "Already present"
            );
            return MergeItemOutcome::SkippedDuplicate {
                existing_id: hit.existing.id.clone(),
                tier: hit.tier,
            };
        }

        let new_id = if self.execution.dry_run {
            None
        } else {
            let request = ImportRequest::from_item(item, path);
            match self.library.import_item(&request).await {
                Ok(new_id) => new_id,
                Err(e) => {
                    tracing::warn!(item_id = %item.id, path = %path.display(), error = %e, "Import failed");
                    return MergeItemOutcome::Failed {
                        reason: e.to_string(),
                    };
                }
            }
        };

        let mut imported = item.clone();
        if let Some(id) = &new_id {
            imported.id = id.clone();
        }
        pool.insert(imported);

        tracing::debug!(item_id = %item.id, new_id = ?new_id, "Imported");
        MergeItemOutcome::Imported { new_id }
    }
}
