//! Run report
//!
//! One `Report` per run, in the same shape for dry-run and live runs. Written
//! as structured text for people and JSON for automation.

use crate::models::{
    CleanupCounts, DuplicateGroup, FpSyncCounts, FpSyncItemOutcome, FpSyncOutcome, MatchTier,
    MergeCounts, MergeItemOutcome, MergeOperation, ResolutionOutcome, RunMode,
};
use crate::services::CoverageResult;
use chrono::{DateTime, Utc};
use mlc_common::{LibraryItem, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Identity and timing of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    pub run_id: Uuid,
    pub mode: RunMode,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new(mode: RunMode, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            dry_run,
            started_at: Utc::now(),
        }
    }
}

/// Group counts per tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub fingerprint: usize,
    pub fuzzy: usize,
    pub ngram: usize,
}

impl TierCounts {
    pub fn total(&self) -> usize {
        self.fingerprint + self.fuzzy + self.ngram
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberRef {
    pub id: String,
    pub name: String,
    pub size: u64,
}

impl From<&LibraryItem> for MemberRef {
    fn from(item: &LibraryItem) -> Self {
        Self {
            id: item.id.clone(),
            name: item.file_name(),
            size: item.size,
        }
    }
}

/// Per-group detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDetail {
    pub index: usize,
    pub tier: MatchTier,
    /// Nominal confidence of the tier, for weighting review
    pub confidence: f64,
    pub similarity: f64,
    /// Quality score of the representative
    pub score: Option<f64>,
    pub representative: Option<MemberRef>,
    pub redundant: Vec<MemberRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(flatten)]
    pub context: RunContext,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub items_scanned: usize,
    pub coverage: Option<CoverageResult>,
    pub groups_by_tier: TierCounts,
    pub redundant_items: usize,
    pub bytes_reclaimable: u64,
    /// Always zero for dry-runs
    pub bytes_reclaimed: u64,
    pub cleanup: CleanupCounts,
    pub groups: Vec<GroupDetail>,
    pub merge: Option<MergeOperation>,
    pub fp_sync: Option<FpSyncOutcome>,
}

/// Aggregate groups and the cleanup outcome into a report
pub fn build_report(
    context: &RunContext,
    items_scanned: usize,
    groups: &[DuplicateGroup],
    outcome: &ResolutionOutcome,
) -> Report {
    let mut by_tier = TierCounts::default();
    let mut details = Vec::with_capacity(groups.len());
    let mut redundant_items = 0;
    let mut bytes_reclaimable = 0;

    for (index, group) in groups.iter().enumerate() {
        match group.tier {
            MatchTier::Fingerprint => by_tier.fingerprint += 1,
            MatchTier::Fuzzy => by_tier.fuzzy += 1,
            MatchTier::Ngram => by_tier.ngram += 1,
        }
        let redundant: Vec<MemberRef> = group.redundant().map(MemberRef::from).collect();
        redundant_items += redundant.len();
        bytes_reclaimable += group.redundant_bytes();

        details.push(GroupDetail {
            index,
            tier: group.tier,
            confidence: group.tier.confidence(),
            similarity: group.similarity,
            score: group.representative_score,
            representative: group.representative().map(MemberRef::from),
            redundant,
        });
    }

    let cleanup = outcome.counts();
    let finished_at = Utc::now();
    let duration_ms = (finished_at - context.started_at).num_milliseconds().max(0) as u64;

    Report {
        context: context.clone(),
        finished_at,
        duration_ms,
        items_scanned,
        coverage: None,
        groups_by_tier: by_tier,
        redundant_items,
        bytes_reclaimable,
        bytes_reclaimed: cleanup.bytes_reclaimed,
        cleanup,
        groups: details,
        merge: None,
        fp_sync: None,
    }
}

impl Report {
    pub fn with_coverage(mut self, coverage: CoverageResult) -> Self {
        self.coverage = Some(coverage);
        self
    }

    pub fn with_merge(mut self, merge: MergeOperation) -> Self {
        self.merge = Some(merge);
        self
    }

    pub fn with_fp_sync(mut self, outcome: FpSyncOutcome) -> Self {
        self.fp_sync = Some(outcome);
        self
    }

    /// Items that failed their intended transition
    pub fn failures(&self) -> usize {
        self.cleanup.failed
            + self.merge.as_ref().map_or(0, |m| m.counts().failed)
            + self.fp_sync.as_ref().map_or(0, |f| f.counts().failed)
    }

    /// Base file name `<mode>-<timestamp>-<run id prefix>`
    pub fn file_stem(&self) -> String {
        let run_id = self.context.run_id.simple().to_string();
        format!(
            "{}-{}-{}",
            self.context.mode,
            self.context.started_at.format("%Y%m%dT%H%M%SZ"),
            &run_id[..8]
        )
    }

    /// Structured text rendering; n-gram groups are listed first
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let run_kind = if self.context.dry_run { "dry-run" } else { "live" };

        let _ = writeln!(out, "mlc-dd {} report ({})", self.context.mode, run_kind);
        let _ = writeln!(out, "run id:        {}", self.context.run_id);
        let _ = writeln!(out, "started:       {}", self.context.started_at.to_rfc3339());
        let _ = writeln!(out, "duration:      {} ms", self.duration_ms);
        let _ = writeln!(out, "items scanned: {}", self.items_scanned);

        if let Some(coverage) = &self.coverage {
            let _ = writeln!(
                out,
                "coverage:      {:.1}% of {} items (minimum {:.1}%, {}), {} without fingerprint, {} excluded",
                coverage.ratio * 100.0,
                coverage.total,
                coverage.min_coverage * 100.0,
                if coverage.passed { "passed" } else { "FAILED" },
                coverage.items_missing.len(),
                coverage.excluded,
            );
        }

        if let Some(merge) = &self.merge {
            render_merge(&mut out, merge);
        }
        if let Some(fp_sync) = &self.fp_sync {
            render_fp_sync(&mut out, fp_sync, self.context.dry_run);
        }

        if self.context.mode == RunMode::FpSync {
            return out;
        }

        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "groups:        {} (fingerprint {}, fuzzy {}, ngram {})",
            self.groups_by_tier.total(),
            self.groups_by_tier.fingerprint,
            self.groups_by_tier.fuzzy,
            self.groups_by_tier.ngram,
        );
        let _ = writeln!(out, "redundant:     {} items", self.redundant_items);
        if self.context.dry_run {
            let _ = writeln!(out, "reclaimable:   {} bytes", self.bytes_reclaimable);
        } else {
            let _ = writeln!(
                out,
                "reclaimed:     {} of {} bytes",
                self.bytes_reclaimed, self.bytes_reclaimable
            );
        }
        let _ = writeln!(
            out,
            "cleanup:       {} attempted, {} trashed, {} failed",
            self.cleanup.attempted, self.cleanup.trashed, self.cleanup.failed
        );

        let mut ordered: Vec<&GroupDetail> = self.groups.iter().collect();
        ordered.sort_by_key(|g| std::cmp::Reverse(g.tier));

        for group in ordered {
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "[{}] group {} confidence {:.2} similarity {:.3} score {}",
                group.tier,
                group.index + 1,
                group.confidence,
                group.similarity,
                group
                    .score
                    .map_or_else(|| "-".to_string(), |s| format!("{:.2}", s)),
            );
            if let Some(keep) = &group.representative {
                let _ = writeln!(out, "  keep    {}  {}  ({} bytes)", keep.id, keep.name, keep.size);
            }
            for member in &group.redundant {
                let _ = writeln!(out, "  remove  {}  {}  ({} bytes)", member.id, member.name, member.size);
            }
        }
        out
    }

    /// Write `<stem>.txt` and `<stem>.json` under `dir`
    pub fn write_to(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir)?;
        let stem = self.file_stem();
        let text_path = dir.join(format!("{}.txt", stem));
        let json_path = dir.join(format!("{}.json", stem));

        std::fs::write(&text_path, self.render_text())?;
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| mlc_common::Error::Internal(format!("Report serialization failed: {}", e)))?;
        std::fs::write(&json_path, json)?;

        tracing::info!(path = %text_path.display(), "Report written");
        Ok((text_path, json_path))
    }
}

fn render_merge(out: &mut String, merge: &MergeOperation) {
    let MergeCounts {
        imported,
        skipped_duplicate,
        skipped_missing_file,
        failed,
    } = merge.counts();

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "merge:         {} -> {}",
        merge.previous_library.display(),
        merge.current_library.display()
    );
    let _ = writeln!(
        out,
        "               {} imported, {} already present, {} missing file, {} failed",
        imported, skipped_duplicate, skipped_missing_file, failed
    );
    for record in &merge.items {
        let line = match &record.outcome {
            MergeItemOutcome::Imported { .. } => continue,
            MergeItemOutcome::SkippedDuplicate { existing_id, tier } => {
                format!("duplicate of {} ({})", existing_id, tier)
            }
            MergeItemOutcome::SkippedMissingFile => "missing file".to_string(),
            MergeItemOutcome::Failed { reason } => format!("FAILED: {}", reason),
        };
        let _ = writeln!(out, "  {}  {}  {}", record.item_id, record.name, line);
    }
}

fn render_fp_sync(out: &mut String, outcome: &FpSyncOutcome, dry_run: bool) {
    let FpSyncCounts {
        already_synced,
        computed,
        embedded,
        tagged,
        recorded,
        skipped,
        failed,
    } = outcome.counts();
    let verb = if dry_run { "would write" } else { "wrote" };

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "fingerprints:  {} already synced, {} computed, {} skipped, {} failed",
        already_synced, computed, skipped, failed
    );
    let _ = writeln!(
        out,
        "               {} {} embedded, {} tags, {} records",
        verb, embedded, tagged, recorded
    );
    for record in &outcome.items {
        if let FpSyncItemOutcome::Failed { reason } = &record.outcome {
            let _ = writeln!(out, "  {}  {}  FAILED: {}", record.item_id, record.name, reason);
        }
    }
}
