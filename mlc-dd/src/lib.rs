//! # mlc-dd
//!
//! Duplicate detection and resolution for a media library.
//!
//! **Modes:**
//! - `dedup`: group duplicates (fingerprint, fuzzy, n-gram), pick a keeper per
//!   group, optionally move the rest to the library trash
//! - `merge`: import a previous library into the current one, skipping what is
//!   already there
//! - `fp-sync`: compute and store content fingerprints so dedup can rely on them
//!
//! Every mode is a dry-run unless `--live` is given.

pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;
pub mod workflow;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
