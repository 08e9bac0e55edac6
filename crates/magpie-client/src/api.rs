//! Bookmark service client: cursor-based sync feed and bookmark edits.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use magpie_core::{defaults, BookmarkCandidate, Error, Result};

/// One page of the bookmark feed.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncResponse {
    #[serde(default)]
    pub bookmarks: Vec<BookmarkCandidate>,
    /// Opaque token covering everything already seen; echoed back on the
    /// next read.
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
    /// Whether the server long-polled before responding.
    #[serde(default)]
    pub waited: bool,
}

/// The narrow contract the pipeline has with the bookmark store.
#[async_trait]
pub trait BookmarkApi: Send + Sync {
    /// Read the next page after `cursor`. `wait` asks the server to
    /// long-poll until new bookmarks arrive.
    async fn sync(&self, cursor: Option<&str>, limit: u32, wait: bool) -> Result<SyncResponse>;

    /// Write enrichment results back. `None` fields are left unchanged
    /// upstream.
    async fn edit_bookmark(
        &self,
        id: i64,
        title: Option<&str>,
        comment: Option<&str>,
    ) -> Result<()>;
}

#[derive(Serialize)]
struct SyncRequest<'a> {
    cursor: Option<&'a str>,
    limit: u32,
    wait: bool,
}

#[derive(Serialize)]
struct EditRequest<'a> {
    id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a str>,
}

/// HTTP implementation against the bookmark service's REST API.
pub struct HttpBookmarkApi {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpBookmarkApi {
    /// Create a client for the service at `base_url` using a bearer token
    /// with read+write scope.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl BookmarkApi for HttpBookmarkApi {
    #[instrument(skip(self), fields(component = "bookmark_api", op = "sync"))]
    async fn sync(&self, cursor: Option<&str>, limit: u32, wait: bool) -> Result<SyncResponse> {
        let request = SyncRequest {
            cursor,
            limit,
            wait,
        };

        let response = self
            .client
            .post(format!("{}/api/v1/bookmarks/sync", self.base_url))
            .bearer_auth(&self.token)
            .timeout(Duration::from_secs(defaults::SYNC_TIMEOUT_SECS))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Request(format!("sync request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!("sync returned {status}: {body}")));
        }

        let page: SyncResponse = response
            .json()
            .await
            .map_err(|e| Error::Request(format!("sync response unreadable: {e}")))?;

        debug!(
            result_count = page.bookmarks.len(),
            has_more = page.has_more,
            waited = page.waited,
            "Sync page received"
        );
        Ok(page)
    }

    #[instrument(skip(self, title, comment), fields(component = "bookmark_api", op = "edit"))]
    async fn edit_bookmark(
        &self,
        id: i64,
        title: Option<&str>,
        comment: Option<&str>,
    ) -> Result<()> {
        let request = EditRequest { id, title, comment };

        let response = self
            .client
            .post(format!("{}/api/v1/bookmarks/edit", self.base_url))
            .bearer_auth(&self.token)
            .timeout(Duration::from_secs(defaults::EDIT_TIMEOUT_SECS))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Request(format!("edit request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!("edit returned {status}: {body}")));
        }

        debug!(bookmark_id = id, "Bookmark updated");
        Ok(())
    }
}
