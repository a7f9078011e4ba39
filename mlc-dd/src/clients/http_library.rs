//! HTTP client for the local media library API
//!
//! Talks to the library's local REST API (default `http://localhost:41595`).
//! Every call is bounded by the client timeout and wrapped in a bounded retry.

use crate::clients::library::{ImportRequest, LibraryError, MediaLibrary};
use crate::config::LibraryApiConfig;
use crate::utils::{retry_with_backoff, RetryPolicy};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mlc_common::LibraryItem;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Items requested per list page
pub const PAGE_SIZE: usize = 1000;

const USER_AGENT: &str = concat!("mlc-dd/", env!("CARGO_PKG_VERSION"));

/// Envelope shared by every library API response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    status: String,
    #[serde(default = "Option::default")]
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_data(self, operation: &str) -> Result<Option<T>, LibraryError> {
        if self.status == "success" {
            Ok(self.data)
        } else {
            Err(LibraryError::Rejected(
                self.message
                    .unwrap_or_else(|| format!("{} returned status {}", operation, self.status)),
            ))
        }
    }
}

/// Item as returned by `/api/item/list`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiItem {
    id: String,
    name: String,
    #[serde(default)]
    ext: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    tags: Vec<String>,
    /// Milliseconds since the epoch
    #[serde(default)]
    modification_time: Option<i64>,
    #[serde(default)]
    last_modified: Option<i64>,
    #[serde(default)]
    is_deleted: bool,
}

#[derive(Debug, Deserialize)]
struct LibraryInfo {
    library: LibraryInfoPath,
}

#[derive(Debug, Deserialize)]
struct LibraryInfoPath {
    path: PathBuf,
}

/// Resolve an item's backing file inside a library folder
///
/// Layout: `<library>/images/<id>.info/<name>.<ext>`. Items without an
/// extension are URL-only bookmarks and have no file.
pub fn item_file_path(library_root: &Path, id: &str, name: &str, ext: &str) -> Option<PathBuf> {
    if ext.trim().is_empty() {
        return None;
    }
    Some(
        library_root
            .join("images")
            .join(format!("{}.info", id))
            .join(format!("{}.{}", name, ext)),
    )
}

fn to_library_item(api: ApiItem, library_root: Option<&Path>) -> LibraryItem {
    let modified_ms = api.modification_time.or(api.last_modified).unwrap_or(0);
    let modified_at: DateTime<Utc> =
        DateTime::from_timestamp_millis(modified_ms).unwrap_or_default();
    let file_path = library_root.and_then(|root| item_file_path(root, &api.id, &api.name, &api.ext));

    LibraryItem::new(
        api.id,
        api.name,
        api.ext,
        api.size,
        modified_at,
        api.tags,
        file_path,
    )
}

/// Media library REST client
pub struct HttpLibraryClient {
    http_client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    retry: RetryPolicy,
    /// Active library root; `None` until configured or fetched
    library_root: RwLock<Option<PathBuf>>,
}

impl HttpLibraryClient {
    pub fn new(config: &LibraryApiConfig) -> Result<Self, LibraryError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| LibraryError::Unreachable(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            retry: RetryPolicy::new(config.max_attempts),
            library_root: RwLock::new(config.library_path.clone()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn token_query(&self) -> Vec<(&'static str, String)> {
        self.token
            .iter()
            .map(|t| ("token", t.clone()))
            .collect()
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<ApiResponse<T>, LibraryError> {
        let response = self
            .http_client
            .get(self.url(path))
            .query(&self.token_query())
            .query(query)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post_once<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<ApiResponse<T>, LibraryError> {
        let response = self
            .http_client
            .post(self.url(path))
            .query(&self.token_query())
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<ApiResponse<T>, LibraryError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LibraryError::Api {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<ApiResponse<T>>()
            .await
            .map_err(|e| LibraryError::Parse(e.to_string()))
    }

    async fn post<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        body: serde_json::Value,
    ) -> Result<Option<T>, LibraryError> {
        let response: ApiResponse<T> =
            retry_with_backoff(operation, &self.retry, || self.post_once(path, &body)).await?;
        response.into_data(operation)
    }

    async fn fetch_library_root(&self) -> Result<PathBuf, LibraryError> {
        let response: ApiResponse<LibraryInfo> = retry_with_backoff("library_info", &self.retry, || {
            self.get_once("/api/library/info", &[])
        })
        .await?;
        response
            .into_data("library_info")?
            .map(|info| info.library.path)
            .ok_or_else(|| LibraryError::Parse("library info without a path".to_string()))
    }
}

#[async_trait]
impl MediaLibrary for HttpLibraryClient {
    async fn list_items(&self) -> Result<Vec<LibraryItem>, LibraryError> {
        let root = self.library_path().await.ok();
        if root.is_none() {
            tracing::warn!("Library root unknown; items will have no file paths");
        }

        let mut items = Vec::new();
        let mut page = 0usize;

        loop {
            let query = [("limit", PAGE_SIZE.to_string()), ("offset", page.to_string())];
            let response: ApiResponse<Vec<ApiItem>> =
                retry_with_backoff("list_items", &self.retry, || {
                    self.get_once("/api/item/list", &query)
                })
                .await?;
            let batch = response.into_data("list_items")?.unwrap_or_default();
            let batch_len = batch.len();

            items.extend(
                batch
                    .into_iter()
                    .filter(|item| !item.is_deleted)
                    .map(|item| to_library_item(item, root.as_deref())),
            );

            tracing::debug!(page, batch = batch_len, total = items.len(), "Fetched item page");

            if batch_len < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        tracing::info!(items = items.len(), "Listed library items");
        Ok(items)
    }

    async fn update_tags(&self, item_id: &str, tags: &[String]) -> Result<bool, LibraryError> {
        let body = json!({ "id": item_id, "tags": tags });
        match self.post::<serde_json::Value>("update_tags", "/api/item/update", body).await {
            Ok(_) => Ok(true),
            Err(LibraryError::Rejected(message)) => {
                tracing::warn!(item_id = %item_id, message = %message, "Tag update rejected");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn move_to_trash(&self, item_ids: &[String]) -> Result<bool, LibraryError> {
        let body = json!({ "itemIds": item_ids });
        match self.post::<serde_json::Value>("move_to_trash", "/api/item/moveToTrash", body).await {
            Ok(_) => Ok(true),
            Err(LibraryError::Rejected(message)) => {
                tracing::warn!(items = item_ids.len(), message = %message, "Trash move rejected");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn switch_library(&self, library_path: &Path) -> Result<bool, LibraryError> {
        let body = json!({ "libraryPath": library_path });
        match self.post::<serde_json::Value>("switch_library", "/api/library/switch", body).await {
            Ok(_) => {
                *self.library_root.write().await = Some(library_path.to_path_buf());
                tracing::info!(library = %library_path.display(), "Switched active library");
                Ok(true)
            }
            Err(LibraryError::Rejected(message)) => {
                tracing::warn!(library = %library_path.display(), message = %message, "Library switch rejected");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn import_item(&self, request: &ImportRequest) -> Result<Option<String>, LibraryError> {
        let body = json!({
            "path": request.path,
            "name": request.name,
            "tags": request.tags,
            "annotation": request.annotation.clone().unwrap_or_default(),
        });
        let data: Option<serde_json::Value> =
            self.post("import_item", "/api/item/addFromPath", body).await?;
        Ok(data.and_then(|v| match v {
            serde_json::Value::String(id) => Some(id),
            serde_json::Value::Object(map) => map
                .get("id")
                .and_then(|id| id.as_str())
                .map(str::to_string),
            _ => None,
        }))
    }

    async fn library_path(&self) -> Result<PathBuf, LibraryError> {
        if let Some(root) = self.library_root.read().await.clone() {
            return Ok(root);
        }
        let root = self.fetch_library_root().await?;
        *self.library_root.write().await = Some(root.clone());
        Ok(root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_file_path_layout() {
        let path = item_file_path(Path::new("/lib/Music.library"), "K1", "Track A", "wav").unwrap();
        assert_eq!(
            path,
            PathBuf::from("/lib/Music.library/images/K1.info/Track A.wav")
        );
    }

    #[test]
    fn test_url_only_item_has_no_path() {
        assert!(item_file_path(Path::new("/lib"), "K1", "Bookmark", "").is_none());
    }

    #[test]
    fn test_api_item_conversion() {
        let raw = r#"{
            "id": "K1",
            "name": "Track A",
            "ext": "wav",
            "size": 2048,
            "tags": ["artist:Someone", "fingerprint:9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"],
            "modificationTime": 1700000000000,
            "isDeleted": false
        }"#;
        let api: ApiItem = serde_json::from_str(raw).unwrap();
        let item = to_library_item(api, Some(Path::new("/lib")));

        assert_eq!(item.id, "K1");
        assert_eq!(item.size, 2048);
        assert_eq!(item.modified_at.timestamp(), 1_700_000_000);
        assert!(item.fingerprint.is_some());
        assert_eq!(item.metadata.artist.as_deref(), Some("Someone"));
        assert_eq!(
            item.file_path,
            Some(PathBuf::from("/lib/images/K1.info/Track A.wav"))
        );
    }

    #[test]
    fn test_failure_envelope_is_rejected() {
        let response: ApiResponse<serde_json::Value> =
            serde_json::from_str(r#"{"status":"error","message":"no such item"}"#).unwrap();
        match response.into_data("update_tags") {
            Err(LibraryError::Rejected(message)) => assert_eq!(message, "no such item"),
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }
}
