//! Clients for external collaborators
//!
//! - `MediaLibrary`: the locally hosted media library (items, tags, trash)
//! - `RecordStore`: the optional remote record database

pub mod http_library;
pub mod library;
pub mod record_store;

pub use http_library::HttpLibraryClient;
pub use library::{ImportRequest, LibraryError, MediaLibrary};
pub use record_store::{HttpRecordStore, RecordStore, RecordStoreError};
