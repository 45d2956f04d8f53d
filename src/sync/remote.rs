//! Remote asset store: checksum listing and asset bodies.
//!
//! The engine only sees the `RemoteStore` trait. `HttpThemeStore` speaks the
//! JSON theme-files endpoint; tests plug in in-process fakes.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::asset::{Asset, AssetContent, Checksum, FileKey};

/// Remote call failures.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("remote rejected credentials ({status})")]
    Unauthorized { status: u16 },

    #[error("remote target not found: {0}")]
    NotFound(String),

    #[error("remote returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed remote response: {0}")]
    Decode(String),
}

/// `{key, checksum}` as listed by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteChecksum {
    pub key: FileKey,
    pub checksum: Checksum,
}

/// Asset body as sent on the wire: text `value` or base64 `attachment`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteAsset {
    pub key: FileKey,
    #[serde(default)]
    pub checksum: Option<Checksum>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub attachment: Option<String>,
}

impl RemoteAsset {
    pub fn into_asset(self) -> Result<Asset, RemoteError> {
        let content = match (self.value, self.attachment) {
            (Some(value), _) => AssetContent::Text(value),
            (None, Some(attachment)) => AssetContent::from_attachment(&attachment)
                .map_err(|e| RemoteError::Decode(format!("`{}` attachment: {e}", self.key)))?,
            (None, None) => {
                return Err(RemoteError::Decode(format!("`{}` has no body", self.key)));
            }
        };
        Ok(Asset::new(self.key, content))
    }
}

/// Source of remote truth for one theme.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Checksums of every remote file.
    async fn fetch_checksums(&self) -> Result<Vec<RemoteChecksum>, RemoteError>;

    /// Full bodies for the given keys.
    async fn fetch_assets(&self, keys: &[FileKey]) -> Result<Vec<Asset>, RemoteError>;
}

// ============================================================================
// HTTP implementation
// ============================================================================

/// Connection details for the theme-files endpoint.
#[derive(Debug, Clone)]
pub struct ThemeTarget {
    /// Store domain, e.g. `shop.myshopify.com`
    pub store: String,
    pub theme_id: u64,
    pub api_version: String,
    pub access_token: String,
}

impl ThemeTarget {
    fn files_url(&self) -> String {
        format!(
            "https://{}/admin/api/{}/themes/{}/files.json",
            self.store, self.api_version, self.theme_id
        )
    }
}

#[derive(Debug, Deserialize)]
struct ChecksumPage {
    files: Vec<RemoteChecksum>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssetPage {
    files: Vec<RemoteAsset>,
}

/// Remote store backed by the admin theme-files JSON endpoint.
pub struct HttpThemeStore {
    client: reqwest::Client,
    target: ThemeTarget,
}

/// Keys per body request.
const FETCH_BATCH: usize = 50;

impl HttpThemeStore {
    pub fn new(target: ThemeTarget, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Transport {
                url: target.files_url(),
                source: Box::new(e),
            })?;
        Ok(Self { client, target })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        query: &[(&str, &str)],
    ) -> Result<T, RemoteError> {
        let url = self.target.files_url();
        let response = self
            .client
            .get(&url)
            .header("X-Shopify-Access-Token", &self.target.access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status().as_u16();
        match status {
            200..=299 => {}
            401 | 403 => return Err(RemoteError::Unauthorized { status }),
            404 => return Err(RemoteError::NotFound(format!("theme {}", self.target.theme_id))),
            _ => {
                let body = response.text().await.unwrap_or_default();
                return Err(RemoteError::Status { status, body });
            }
        }

        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

fn transport_error(url: &str, err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::Timeout(url.to_string())
    } else {
        RemoteError::Transport {
            url: url.to_string(),
            source: Box::new(err),
        }
    }
}

#[async_trait]
impl RemoteStore for HttpThemeStore {
    async fn fetch_checksums(&self) -> Result<Vec<RemoteChecksum>, RemoteError> {
        let mut checksums = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut query = vec![("fields", "key,checksum")];
            if let Some(cursor) = after.as_deref() {
                query.push(("after", cursor));
            }
            let page: ChecksumPage = self.get_json(&query).await?;
            checksums.extend(page.files);

            match page.next {
                Some(cursor) => after = Some(cursor),
                None => return Ok(checksums),
            }
        }
    }

    async fn fetch_assets(&self, keys: &[FileKey]) -> Result<Vec<Asset>, RemoteError> {
        let mut assets = Vec::with_capacity(keys.len());
        for batch in keys.chunks(FETCH_BATCH) {
            let joined = batch.iter().map(FileKey::as_str).collect::<Vec<_>>().join(",");
            let page: AssetPage = self.get_json(&[("keys", joined.as_str())]).await?;
            for remote in page.files {
                assets.push(remote.into_asset()?);
            }
        }
        Ok(assets)
    }
}
