//! `runs` table access
//!
//! One row per run, written after the report files. The ledger is an index
//! for automation; the report files remain the record of what happened.

use crate::services::Report;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::path::Path;

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// Coverage gate refused resolution
    CoverageRefused,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::CoverageRefused => "coverage_refused",
        }
    }
}

/// Ledger row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRow {
    pub run_id: String,
    pub mode: String,
    pub dry_run: bool,
    pub started_at: String,
    pub duration_ms: i64,
    pub items_scanned: i64,
    pub groups_found: i64,
    pub redundant_items: i64,
    /// Reclaimed bytes for live runs, reclaimable for dry-runs
    pub bytes: i64,
    pub failures: i64,
    pub status: String,
    pub report_path: Option<String>,
}

impl RunRow {
    pub fn from_report(report: &Report, status: RunStatus, report_path: Option<&Path>) -> Self {
        let bytes = if report.context.dry_run {
            report.bytes_reclaimable
        } else {
            report.bytes_reclaimed
        };
        Self {
            run_id: report.context.run_id.to_string(),
            mode: report.context.mode.to_string(),
            dry_run: report.context.dry_run,
            started_at: report.context.started_at.to_rfc3339(),
            duration_ms: report.duration_ms as i64,
            items_scanned: report.items_scanned as i64,
            groups_found: report.groups_by_tier.total() as i64,
            redundant_items: report.redundant_items as i64,
            bytes: bytes as i64,
            failures: report.failures() as i64,
            status: status.as_str().to_string(),
            report_path: report_path.map(|p| p.display().to_string()),
        }
    }
}

/// Append a run to the ledger
pub async fn record_run(pool: &SqlitePool, row: &RunRow) -> mlc_common::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO runs (
            run_id, mode, dry_run, started_at, duration_ms, items_scanned,
            groups_found, redundant_items, bytes, failures, status, report_path
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&row.run_id)
    .bind(&row.mode)
    .bind(row.dry_run)
    .bind(&row.started_at)
    .bind(row.duration_ms)
    .bind(row.items_scanned)
    .bind(row.groups_found)
    .bind(row.redundant_items)
    .bind(row.bytes)
    .bind(row.failures)
    .bind(&row.status)
    .bind(&row.report_path)
    .execute(pool)
    .await?;

    tracing::debug!(run_id = %row.run_id, status = %row.status, "Run recorded in ledger");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResolutionOutcome, RunMode};
    use crate::services::{build_report, RunContext};
    use mlc_common::db::init_database;
    use sqlx::Row;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_record_run_persists_row() {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("ledger.db")).await.unwrap();

        let context = RunContext::new(RunMode::Dedup, true);
        let report = build_report(&context, 12, &[], &ResolutionOutcome::planned(true));
        let row = RunRow::from_report(&report, RunStatus::Completed, Some(Path::new("/tmp/r.txt")));
        record_run(&pool, &row).await.unwrap();

        let stored = sqlx::query("SELECT run_id, mode, dry_run, items_scanned, status, report_path FROM runs")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].get::<String, _>("run_id"), row.run_id);
        assert_eq!(stored[0].get::<String, _>("mode"), "dedup");
        assert!(stored[0].get::<bool, _>("dry_run"));
        assert_eq!(stored[0].get::<i64, _>("items_scanned"), 12);
        assert_eq!(stored[0].get::<String, _>("status"), row.status);
        assert_eq!(stored[0].get::<Option<String>, _>("report_path").as_deref(), Some("/tmp/r.txt"));
    }
}
