//! Engine services
//!
//! - Fingerprint computation and storage (file metadata, library tag)
//! - Coverage gate
//! - Three-tier similarity matcher
//! - Quality scorer (representative selection)
//! - Report builder

pub mod coverage_gate;
pub mod fingerprint_store;
pub mod fingerprinter;
pub mod name_similarity;
pub mod quality_scorer;
pub mod report_builder;
pub mod similarity_matcher;

pub use coverage_gate::{check_coverage, CoverageGate, CoverageResult};
pub use fingerprint_store::{
    resolve_from_metadata, supports_embedding, FingerprintStore, StoreError,
};
pub use fingerprinter::{compute_fingerprint, FingerprintError};
pub use quality_scorer::QualityScorer;
pub use report_builder::{build_report, GroupDetail, MemberRef, Report, RunContext, TierCounts};
pub use similarity_matcher::{MatchHit, MatchKey, MatchPool, SimilarityMatcher};
