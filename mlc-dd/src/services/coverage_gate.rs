//! Fingerprint coverage gate
//!
//! Measures the share of items lacking a fingerprint and blocks duplicate
//! resolution when it is too large.

use crate::config::CoverageConfig;
use mlc_common::LibraryItem;
use serde::{Deserialize, Serialize};

/// Coverage of a candidate item set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageResult {
    /// Items counted in the denominator
    pub total: usize,
    pub with_fingerprint: usize,
    /// Items without a plausible file (URL-only), excluded from the ratio
    pub excluded: usize,
    pub ratio: f64,
    pub min_coverage: f64,
    pub passed: bool,
    /// Ids of counted items lacking a fingerprint
    pub items_missing: Vec<String>,
}

/// Coverage gate
pub struct CoverageGate {
    min_coverage: f64,
    required: bool,
}

impl CoverageGate {
    pub fn new(config: &CoverageConfig) -> Self {
        Self {
            min_coverage: config.min_coverage,
            required: config.required,
        }
    }

    /// Whether a failed check must block resolution
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Compute `items_with_fingerprint / total_items` over items with a file
    ///
    /// An empty denominator counts as full coverage.
    pub fn check_coverage(&self, items: &[LibraryItem]) -> CoverageResult {
        check_coverage(items, self.min_coverage)
    }
}

/// Free-standing coverage check with an explicit minimum
pub fn check_coverage(items: &[LibraryItem], min_coverage: f64) -> CoverageResult {
    let mut total = 0usize;
    let mut with_fingerprint = 0usize;
    let mut excluded = 0usize;
    let mut items_missing = Vec::new();

    for item in items {
        if !item.has_plausible_file() {
            excluded += 1;
            continue;
        }
        total += 1;
        if item.fingerprint.is_some() {
            with_fingerprint += 1;
        } else {
            items_missing.push(item.id.clone());
        }
    }

    let ratio = if total == 0 {
        1.0
    } else {
        with_fingerprint as f64 / total as f64
    };
    let passed = ratio >= min_coverage;

    tracing::info!(
        total,
        with_fingerprint,
        excluded,
        ratio,
        min_coverage,
        passed,
        "Fingerprint coverage checked"
    );

    CoverageResult {
        total,
        with_fingerprint,
        excluded,
        ratio,
        min_coverage,
        passed,
        items_missing,
    }
}
