//! Configuration file loading and data folder resolution
//!
//! Settings are resolved per key in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! This module owns layers 3 and 4; the binaries layer CLI and ENV on top.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "MLC_CONFIG";

/// Logging section of the TOML config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset (e.g. "info")
    pub level: Option<String>,
}

/// Record database section of the TOML config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordStoreConfig {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub database_id: Option<String>,
}

/// On-disk TOML configuration
///
/// Every field is optional: a missing key falls through to the compiled default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    pub library_api_url: Option<String>,
    pub library_api_token: Option<String>,
    pub library_path: Option<PathBuf>,
    pub api_timeout_secs: Option<u64>,
    pub api_max_attempts: Option<u32>,
    pub min_similarity: Option<f64>,
    pub short_name_max_len: Option<usize>,
    pub short_name_threshold: Option<f64>,
    pub ngram_threshold: Option<f64>,
    pub min_coverage: Option<f64>,
    pub require_coverage: Option<bool>,
    pub recent_window_days: Option<i64>,
    pub size_floor_bytes: Option<u64>,
    pub report_dir: Option<PathBuf>,
    pub ledger_path: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub record_store: RecordStoreConfig,
}

/// Locate the config file: `$MLC_CONFIG`, else `<config_dir>/mlc/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    dirs::config_dir().map(|d| d.join("mlc").join("config.toml"))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Where the loaded settings came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigOrigin {
    File(PathBuf),
    /// Path resolved but no file there; defaults used
    Missing(PathBuf),
    /// No config directory on this platform; defaults used
    NoConfigDir,
}

impl ConfigOrigin {
    /// Log the origin; call once a subscriber is installed
    pub fn log(&self) {
        match self {
            ConfigOrigin::File(path) => debug!(path = %path.display(), "Loaded TOML config"),
            ConfigOrigin::Missing(path) => {
                warn!(path = %path.display(), "Config file not found, using defaults")
            }
            ConfigOrigin::NoConfigDir => warn!("Could not determine config directory, using defaults"),
        }
    }
}

/// Settings from the config file plus their origin
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub config: TomlConfig,
    pub origin: ConfigOrigin,
}

/// Load the config file if present
///
/// A missing file yields defaults; a file that exists but does not parse is
/// an error. Callers log `origin` once tracing is installed.
pub fn load_or_default(path: Option<&Path>) -> Result<LoadedConfig> {
    match path {
        Some(path) if path.exists() => Ok(LoadedConfig {
            config: load_toml_config(path)?,
            origin: ConfigOrigin::File(path.to_path_buf()),
        }),
        Some(path) => Ok(LoadedConfig {
            config: TomlConfig::default(),
            origin: ConfigOrigin::Missing(path.to_path_buf()),
        }),
        None => Ok(LoadedConfig {
            config: TomlConfig::default(),
            origin: ConfigOrigin::NoConfigDir,
        }),
    }
}

/// OS-dependent data folder for reports and the run ledger
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mlc"))
        .unwrap_or_else(|| PathBuf::from("./mlc_data"))
}
