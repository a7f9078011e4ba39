//! # mlc-common
//!
//! Shared code for the media-library curator crates:
//! - Library item and fingerprint data model
//! - Error type shared across crates
//! - Configuration file loading
//! - Run ledger database initialization

pub mod config;
pub mod db;
pub mod error;
pub mod item;

pub use error::{Error, Result};
pub use item::{Fingerprint, ItemMetadata, LibraryItem, FINGERPRINT_TAG_PREFIX};
