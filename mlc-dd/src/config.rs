//! Engine configuration for mlc-dd
//!
//! Provides multi-tier configuration resolution with CLI → ENV → TOML → default
//! priority. CLI and ENV arrive together through clap (`#[arg(env = ...)]`);
//! this module folds them over the TOML file and the compiled defaults into one
//! immutable `EngineConfig` that is passed by reference to every component.

use mlc_common::config::{default_data_dir, TomlConfig};
use mlc_common::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_LIBRARY_API_URL: &str = "http://localhost:41595";
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_API_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.75;
pub const DEFAULT_SHORT_NAME_MAX_LEN: usize = 5;
pub const DEFAULT_SHORT_NAME_THRESHOLD: f64 = 0.90;
pub const DEFAULT_NGRAM_THRESHOLD: f64 = 0.60;
pub const DEFAULT_MIN_COVERAGE: f64 = 0.80;
pub const DEFAULT_RECENT_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_SIZE_FLOOR_BYTES: u64 = 5 * 1024 * 1024;

/// Local media-library API connection
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryApiConfig {
    pub api_url: String,
    pub token: Option<String>,
    /// Root folder of the current library, used to resolve item file paths
    pub library_path: Option<PathBuf>,
    /// Per-call timeout
    pub timeout: Duration,
    /// Attempts per call, including the first
    pub max_attempts: u32,
}

/// Similarity matcher thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct MatchingConfig {
    /// Fuzzy tier composite threshold
    pub min_similarity: f64,
    /// Normalized names this short or shorter use `short_name_threshold`
    pub short_name_max_len: usize,
    pub short_name_threshold: f64,
    /// N-gram tier Jaccard lower bound (exclusive)
    pub ngram_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_similarity: DEFAULT_MIN_SIMILARITY,
            short_name_max_len: DEFAULT_SHORT_NAME_MAX_LEN,
            short_name_threshold: DEFAULT_SHORT_NAME_THRESHOLD,
            ngram_threshold: DEFAULT_NGRAM_THRESHOLD,
        }
    }
}

/// Coverage gate settings
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageConfig {
    pub min_coverage: f64,
    /// Fail closed unless explicitly disabled
    pub required: bool,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            min_coverage: DEFAULT_MIN_COVERAGE,
            required: true,
        }
    }
}

/// Quality scorer settings
#[derive(Debug, Clone, PartialEq)]
pub struct QualityConfig {
    pub recent_window_days: i64,
    pub size_floor_bytes: u64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            recent_window_days: DEFAULT_RECENT_WINDOW_DAYS,
            size_floor_bytes: DEFAULT_SIZE_FLOOR_BYTES,
        }
    }
}

/// What a run is allowed to mutate
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// No mutation at all (default)
    pub dry_run: bool,
    /// Move redundant items to the library trash (live runs only)
    pub cleanup: bool,
    /// Overwrite a differing fingerprint tag during fp-sync
    pub force_tag: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            cleanup: false,
            force_tag: false,
        }
    }
}

/// Record database connection (optional collaborator)
#[derive(Debug, Clone, PartialEq)]
pub struct RecordStoreSettings {
    pub api_url: String,
    pub token: String,
    pub database_id: String,
}

/// Immutable configuration for one engine run
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub library: LibraryApiConfig,
    pub matching: MatchingConfig,
    pub coverage: CoverageConfig,
    pub quality: QualityConfig,
    pub execution: ExecutionConfig,
    pub report_dir: PathBuf,
    pub ledger_path: Option<PathBuf>,
    pub record_store: Option<RecordStoreSettings>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            library: LibraryApiConfig {
                api_url: DEFAULT_LIBRARY_API_URL.to_string(),
                token: None,
                library_path: None,
                timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
                max_attempts: DEFAULT_API_MAX_ATTEMPTS,
            },
            matching: MatchingConfig::default(),
            coverage: CoverageConfig::default(),
            quality: QualityConfig::default(),
            execution: ExecutionConfig::default(),
            report_dir: data_dir.join("reports"),
            ledger_path: Some(data_dir.join("ledger.db")),
            record_store: None,
        }
    }
}

/// Values supplied on the command line or through the environment
///
/// `None` means "not given"; the TOML file and compiled defaults fill the gap.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub library_api_url: Option<String>,
    pub library_api_token: Option<String>,
    pub library_path: Option<PathBuf>,
    pub min_similarity: Option<f64>,
    pub min_coverage: Option<f64>,
    /// `Some(false)` when the caller explicitly opted out of the gate
    pub require_coverage: Option<bool>,
    pub live: bool,
    pub cleanup: bool,
    pub force_tag: bool,
    pub report_dir: Option<PathBuf>,
    pub no_ledger: bool,
}

impl EngineConfig {
    /// Fold overrides over the TOML config and compiled defaults
    pub fn resolve(overrides: ConfigOverrides, toml: &TomlConfig) -> Result<Self> {
        let defaults = EngineConfig::default();

        let record_store = match (
            toml.record_store.api_url.clone(),
            toml.record_store.token.clone(),
            toml.record_store.database_id.clone(),
        ) {
            (url, Some(token), Some(database_id)) => Some(RecordStoreSettings {
                api_url: url.unwrap_or_else(|| "https://api.notion.com".to_string()),
                token,
                database_id,
            }),
            _ => None,
        };

        let config = Self {
            library: LibraryApiConfig {
                api_url: overrides
                    .library_api_url
                    .or_else(|| toml.library_api_url.clone())
                    .unwrap_or(defaults.library.api_url),
                token: overrides
                    .library_api_token
                    .or_else(|| toml.library_api_token.clone()),
                library_path: overrides
                    .library_path
                    .or_else(|| toml.library_path.clone()),
                timeout: toml
                    .api_timeout_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.library.timeout),
                max_attempts: toml
                    .api_max_attempts
                    .unwrap_or(defaults.library.max_attempts),
            },
            matching: MatchingConfig {
                min_similarity: overrides
                    .min_similarity
                    .or(toml.min_similarity)
                    .unwrap_or(defaults.matching.min_similarity),
                short_name_max_len: toml
                    .short_name_max_len
                    .unwrap_or(defaults.matching.short_name_max_len),
                short_name_threshold: toml
                    .short_name_threshold
                    .unwrap_or(defaults.matching.short_name_threshold),
                ngram_threshold: toml
                    .ngram_threshold
                    .unwrap_or(defaults.matching.ngram_threshold),
            },
            coverage: CoverageConfig {
                min_coverage: overrides
                    .min_coverage
                    .or(toml.min_coverage)
                    .unwrap_or(defaults.coverage.min_coverage),
                required: overrides
                    .require_coverage
                    .or(toml.require_coverage)
                    .unwrap_or(defaults.coverage.required),
            },
            quality: QualityConfig {
                recent_window_days: toml
                    .recent_window_days
                    .unwrap_or(defaults.quality.recent_window_days),
                size_floor_bytes: toml
                    .size_floor_bytes
                    .unwrap_or(defaults.quality.size_floor_bytes),
            },
            execution: ExecutionConfig {
                dry_run: !overrides.live,
                cleanup: overrides.cleanup,
                force_tag: overrides.force_tag,
            },
            report_dir: overrides
                .report_dir
                .or_else(|| toml.report_dir.clone())
                .unwrap_or(defaults.report_dir),
            ledger_path: if overrides.no_ledger {
                None
            } else {
                toml.ledger_path.clone().or(defaults.ledger_path)
            },
            record_store,
        };

        config.validate()?;

        info!(
            api_url = %config.library.api_url,
            dry_run = config.execution.dry_run,
            cleanup = config.execution.cleanup,
            min_similarity = config.matching.min_similarity,
            min_coverage = config.coverage.min_coverage,
            require_coverage = config.coverage.required,
            "Engine configuration resolved"
        );

        Ok(config)
    }

    /// Reject thresholds outside [0, 1] and a zero attempt budget
    pub fn validate(&self) -> Result<()> {
        let unit = [
            ("min_similarity", self.matching.min_similarity),
            ("short_name_threshold", self.matching.short_name_threshold),
            ("ngram_threshold", self.matching.ngram_threshold),
            ("min_coverage", self.coverage.min_coverage),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }
        if self.library.max_attempts == 0 {
            return Err(Error::Config("api_max_attempts must be at least 1".to_string()));
        }
        if self.quality.recent_window_days < 0 {
            return Err(Error::Config("recent_window_days must not be negative".to_string()));
        }
        Ok(())
    }
}
