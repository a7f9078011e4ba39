//! Fingerprint synchronization (fp-sync mode)
//!
//! Raises fingerprint coverage ahead of a dedup run. For every item with a
//! file, the fingerprint is taken from the library tag, else from embedded
//! metadata, else computed from the file bytes. Live runs then write it back
//! wherever it is missing: file metadata, library tag and (when configured)
//! the record database. Dry-runs report the writes they would make.

use crate::clients::{MediaLibrary, RecordStore};
use crate::config::{EngineConfig, ExecutionConfig};
use crate::error::EngineResult;
use crate::models::{
    FingerprintSource, FpSyncItemOutcome, FpSyncOutcome, ResolutionOutcome, SyncActions,
};
use crate::services::fingerprint_store::{embed, extract};
use crate::services::{
    build_report, compute_fingerprint, supports_embedding, FingerprintError, FingerprintStore,
    Report, RunContext,
};
use mlc_common::{Fingerprint, LibraryItem};
use std::path::Path;
use std::sync::Arc;

/// Fingerprint and the writes it still needs
#[derive(Debug, Clone, PartialEq)]
struct SyncPlan {
    source: FingerprintSource,
    fingerprint: Fingerprint,
    actions: SyncActions,
}

pub struct FpSyncWorkflow {
    library: Arc<dyn MediaLibrary>,
    store: FingerprintStore,
    records: Option<Arc<dyn RecordStore>>,
    execution: ExecutionConfig,
}

impl FpSyncWorkflow {
    pub fn new(
        library: Arc<dyn MediaLibrary>,
        records: Option<Arc<dyn RecordStore>>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store: FingerprintStore::new(Arc::clone(&library)),
            library,
            records,
            execution: config.execution.clone(),
        }
    }

    pub async fn run(&self, context: &RunContext) -> EngineResult<Report> {
        let items = self.library.list_items().await?;
        let mut outcome = FpSyncOutcome::default();

        for (i, item) in items.iter().enumerate() {
            let result = self.sync_item(item).await;
            outcome.record(&item.id, &item.file_name(), result);
            if (i + 1) % 500 == 0 {
                tracing::info!(processed = i + 1, total = items.len(), "fp-sync progress");
            }
        }

        let counts = outcome.counts();
        tracing::info!(
            items = items.len(),
            already_synced = counts.already_synced,
            computed = counts.computed,
            embedded = counts.embedded,
            tagged = counts.tagged,
            recorded = counts.recorded,
            skipped = counts.skipped,
            failed = counts.failed,
            dry_run = self.execution.dry_run,
            "fp-sync complete"
        );

        let resolution = ResolutionOutcome::planned(self.execution.dry_run);
        Ok(build_report(context, items.len(), &[], &resolution).with_fp_sync(outcome))
    }

    async fn sync_item(&self, item: &LibraryItem) -> FpSyncItemOutcome {
        let Some(path) = item.path() else {
            return FpSyncItemOutcome::Skipped {
                reason: "no file".to_string(),
            };
        };
        if !path.is_file() {
            return FpSyncItemOutcome::Skipped {
                reason: "file missing".to_string(),
            };
        }

        let plan = match self.plan(item, path) {
            Ok(plan) => plan,
            Err(outcome) => return outcome,
        };

        if self.execution.dry_run {
            return FpSyncItemOutcome::Synced {
                source: plan.source,
                fingerprint: plan.fingerprint,
                actions: plan.actions,
            };
        }
        self.apply(item, path, plan).await
    }

    /// Resolve the fingerprint and decide which writes are missing
    fn plan(&self, item: &LibraryItem, path: &Path) -> Result<SyncPlan, FpSyncItemOutcome> {
        let embedded = extract(path).unwrap_or_else(|e| {
            tracing::warn!(item_id = %item.id, path = %path.display(), error = %e, "Metadata read failed");
            None
        });
        let tagged = item.tag_fingerprint();

        let (source, fingerprint) = match (&tagged, &embedded) {
            (Some(fp), _) => (FingerprintSource::Tag, fp.clone()),
            (None, Some(fp)) => (FingerprintSource::Metadata, fp.clone()),
            (None, None) => match compute_fingerprint(path) {
                Ok(fp) => (FingerprintSource::Computed, fp),
                Err(FingerprintError::FileEmpty(_)) => {
                    return Err(FpSyncItemOutcome::Skipped {
                        reason: "empty file".to_string(),
                    })
                }
                Err(e) => {
                    tracing::warn!(item_id = %item.id, error = %e, "Fingerprint computation failed");
                    return Err(FpSyncItemOutcome::Failed {
                        reason: e.to_string(),
                    });
                }
            },
        };

        let force = self.execution.force_tag;

        let embed = supports_embedding(path)
            && embedded.as_ref() != Some(&fingerprint)
            && (embedded.is_none() || force);

        // A parsed tag is always the source, so any other fingerprint tag is a
        // duplicate or unparseable and gets replaced
        let tag = !(tagged.as_ref() == Some(&fingerprint) && item.fingerprint_tag_count() == 1);

        let record = self.records.is_some() && source != FingerprintSource::Tag;

        Ok(SyncPlan {
            source,
            fingerprint,
            actions: SyncActions { embed, tag, record },
        })
    }

    async fn apply(&self, item: &LibraryItem, path: &Path, plan: SyncPlan) -> FpSyncItemOutcome {
        let mut done = SyncActions::default();
        let mut errors = Vec::new();

        if plan.actions.embed {
            match embed(path, &plan.fingerprint) {
                Ok(written) => done.embed = written,
                Err(e) => errors.push(format!("embed: {}", e)),
            }
        }

        if plan.actions.tag {
            match self
                .store
                .sync_to_library_tag(item, &plan.fingerprint, self.execution.force_tag)
                .await
            {
                Ok(updated) => done.tag = updated,
                Err(e) => errors.push(format!("tag: {}", e)),
            }
        }

        if let (true, Some(records)) = (plan.actions.record, &self.records) {
            match records.attach_fingerprint(path, &plan.fingerprint).await {
                Ok(attached) => done.record = attached,
                Err(e) => errors.push(format!("record: {}", e)),
            }
        }

        if !errors.is_empty() {
            let reason = errors.join("; ");
            tracing::warn!(item_id = %item.id, reason = %reason, "fp-sync item failed");
            return FpSyncItemOutcome::Failed { reason };
        }

        FpSyncItemOutcome::Synced {
            source: plan.source,
            fingerprint: plan.fingerprint,
            actions: done,
        }
    }
}
