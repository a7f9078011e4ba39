//! Record database client
//!
//! Persists computed fingerprints against records in a remote workspace
//! database, matched by recorded file path. A missing record is not an error:
//! the fingerprint stays valid through file metadata and the library tag.

use crate::config::RecordStoreSettings;
use crate::utils::{retry_with_backoff, RetryPolicy, Transient};
use async_trait::async_trait;
use mlc_common::Fingerprint;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const API_VERSION: &str = "2022-06-28";
const FILE_PATH_PROPERTY: &str = "File Path";
const FINGERPRINT_PROPERTY: &str = "Fingerprint";

/// Record database client errors
#[derive(Debug, Error)]
pub enum RecordStoreError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl Transient for RecordStoreError {
    fn is_transient(&self) -> bool {
        match self {
            RecordStoreError::Network(_) => true,
            RecordStoreError::Api(status, _) => *status == 429 || *status >= 500,
            RecordStoreError::Parse(_) => false,
        }
    }
}

/// Remote record database
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Attach a fingerprint to the record whose file path matches
    ///
    /// Returns `false` when no record matches.
    async fn attach_fingerprint(
        &self,
        file_path: &Path,
        fingerprint: &Fingerprint,
    ) -> Result<bool, RecordStoreError>;
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<PageRef>,
}

#[derive(Debug, Deserialize)]
struct PageRef {
    id: String,
}

/// Workspace database REST client
pub struct HttpRecordStore {
    http_client: reqwest::Client,
    settings: RecordStoreSettings,
    retry: RetryPolicy,
}

impl HttpRecordStore {
    pub fn new(
        settings: RecordStoreSettings,
        timeout: Duration,
        max_attempts: u32,
    ) -> Result<Self, RecordStoreError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RecordStoreError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            settings,
            retry: RetryPolicy::new(max_attempts),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.api_url.trim_end_matches('/'), path)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, RecordStoreError> {
        let response = request
            .bearer_auth(&self.settings.token)
            .header("Notion-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| RecordStoreError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RecordStoreError::Api(status.as_u16(), error_text));
        }
        Ok(response)
    }

    async fn find_record(&self, file_path: &str) -> Result<Option<String>, RecordStoreError> {
        let url = self.url(&format!("/v1/databases/{}/query", self.settings.database_id));
        let body = json!({
            "filter": {
                "property": FILE_PATH_PROPERTY,
                "rich_text": { "equals": file_path }
            },
            "page_size": 1
        });

        let response = retry_with_backoff("record_query", &self.retry, || {
            self.send(self.http_client.post(&url).json(&body))
        })
        .await?;

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| RecordStoreError::Parse(e.to_string()))?;
        Ok(parsed.results.into_iter().next().map(|page| page.id))
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn attach_fingerprint(
        &self,
        file_path: &Path,
        fingerprint: &Fingerprint,
    ) -> Result<bool, RecordStoreError> {
        let path_str = file_path.to_string_lossy();
        let Some(page_id) = self.find_record(&path_str).await? else {
            tracing::debug!(path = %path_str, "No record for file path");
            return Ok(false);
        };

        let url = self.url(&format!("/v1/pages/{}", page_id));
        let body = json!({
            "properties": {
                FINGERPRINT_PROPERTY: {
                    "rich_text": [{ "text": { "content": fingerprint.as_str() } }]
                }
            }
        });

        retry_with_backoff("record_update", &self.retry, || {
            self.send(self.http_client.patch(&url).json(&body))
        })
        .await?;

        tracing::debug!(path = %path_str, page_id = %page_id, "Fingerprint attached to record");
        Ok(true)
    }
}
