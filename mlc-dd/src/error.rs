//! Error types for mlc-dd
//!
//! Run-level errors only. Per-item failures (unreadable file, rejected tag
//! update, failed trash move, failed import) are recorded as outcomes and never
//! surface as an `EngineError`.

use crate::clients::LibraryError;
use crate::services::CoverageResult;
use thiserror::Error;

/// Exit code for a completed run (dry-run or live, duplicates or not)
pub const EXIT_OK: i32 = 0;
/// Exit code for an unrecoverable setup failure
pub const EXIT_SETUP: i32 = 2;
/// Exit code for a coverage gate refusal
pub const EXIT_COVERAGE: i32 = 3;

/// Run-level engine error
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid configuration or paths; nothing was attempted
    #[error("Setup error: {0}")]
    Setup(String),

    /// Fingerprint coverage below the required minimum; nothing was mutated
    #[error(
        "Fingerprint coverage {:.1}% is below the required {:.1}% ({} items missing a fingerprint)",
        .0.ratio * 100.0,
        .0.min_coverage * 100.0,
        .0.items_missing.len()
    )]
    Coverage(CoverageResult),

    /// Media library unreachable or rejected a setup call
    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    /// mlc-common error
    #[error("Common error: {0}")]
    Common(#[from] mlc_common::Error),
}

impl EngineError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Coverage(_) => EXIT_COVERAGE,
            _ => EXIT_SETUP,
        }
    }
}

/// Result type for engine runs
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let coverage = EngineError::Coverage(CoverageResult {
            total: 10,
            with_fingerprint: 1,
            excluded: 0,
            ratio: 0.1,
            min_coverage: 0.8,
            passed: false,
            items_missing: vec!["A".into(); 9],
        });
        assert_eq!(coverage.exit_code(), EXIT_COVERAGE);
        assert!(coverage.to_string().contains("9 items missing"));

        let setup = EngineError::Setup("no previous library".into());
        assert_eq!(setup.exit_code(), EXIT_SETUP);
    }
}
