//! Media library collaborator interface

use crate::utils::Transient;
use async_trait::async_trait;
use mlc_common::LibraryItem;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Media library client errors
#[derive(Debug, Error)]
pub enum LibraryError {
    /// Connection refused or transport failure
    #[error("Library unreachable: {0}")]
    Unreachable(String),

    /// Call exceeded its timeout
    #[error("Library call timed out: {0}")]
    Timeout(String),

    /// Non-success HTTP status
    #[error("Library API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Library answered but reported a failure status
    #[error("Library rejected request: {0}")]
    Rejected(String),

    /// Response body did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Transient for LibraryError {
    fn is_transient(&self) -> bool {
        match self {
            LibraryError::Unreachable(_) | LibraryError::Timeout(_) => true,
            LibraryError::Api { status, .. } => *status >= 500,
            LibraryError::Rejected(_) | LibraryError::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for LibraryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LibraryError::Timeout(err.to_string())
        } else if err.is_decode() {
            LibraryError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            LibraryError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            LibraryError::Unreachable(err.to_string())
        }
    }
}

/// A file to add to the active library
#[derive(Debug, Clone, PartialEq)]
pub struct ImportRequest {
    pub path: PathBuf,
    pub name: String,
    pub tags: Vec<String>,
    pub annotation: Option<String>,
}

impl ImportRequest {
    /// Import request carrying over an item's name and tags
    pub fn from_item(item: &LibraryItem, path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            name: item.name.clone(),
            tags: item.tags.clone(),
            annotation: None,
        }
    }
}

/// The media library as seen by the engine
///
/// All calls act on the active library; `switch_library` changes which one is
/// active. Implementations bound every call with a timeout.
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    /// Every (non-deleted) item of the active library
    async fn list_items(&self) -> Result<Vec<LibraryItem>, LibraryError>;

    /// Replace an item's tag list
    async fn update_tags(&self, item_id: &str, tags: &[String]) -> Result<bool, LibraryError>;

    /// Move items to the library's own (reversible) trash
    async fn move_to_trash(&self, item_ids: &[String]) -> Result<bool, LibraryError>;

    /// Make another library folder the active library
    async fn switch_library(&self, library_path: &Path) -> Result<bool, LibraryError>;

    /// Add a file to the active library, returning the new id when reported
    async fn import_item(&self, request: &ImportRequest) -> Result<Option<String>, LibraryError>;

    /// Root folder of the active library
    async fn library_path(&self) -> Result<PathBuf, LibraryError>;
}
