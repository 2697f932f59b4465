//! Blob storage for receipt images.
//!
//! The HTTP client speaks the object-storage REST dialect used by the
//! finance tracker's hosted store: objects are uploaded with
//! `POST {base}/object/{bucket}/{path}` and served from
//! `{base}/object/public/{bucket}/{path}`.

use crate::error::BlobError;
use async_trait::async_trait;
use ledgerbot_core::Result;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

/// Storage for uploaded files.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Uploads `bytes` under `path` and returns a public URL.
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str)
    -> Result<String, BlobError>;
}

/// Configuration for the hosted object store.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Storage API root, e.g. `https://project.example.co/storage/v1`.
    pub base_url: String,
    /// Bucket that receipt images are written to.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Service key sent as a bearer token.
    pub service_key: String,
}

fn default_bucket() -> String {
    "receipts".to_string()
}

/// Object store client over HTTP.
#[derive(Clone)]
pub struct HttpBlobStore {
    http: reqwest::Client,
    config: StorageConfig,
}

impl HttpBlobStore {
    /// Creates a client whose requests time out after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: StorageConfig, timeout: Duration) -> Result<Self, BlobError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BlobError::Transport {
                path: String::new(),
                reason: format!("HTTP client error: {e}"),
            })?;
        Ok(Self { http, config })
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    #[must_use]
    pub fn public_url(&self, path: &str) -> String {
        format!("{}/object/public/{}/{}", self.base(), self.config.bucket, path)
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BlobError> {
        let url = format!("{}/object/{}/{}", self.base(), self.config.bucket, path);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.service_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(|e| BlobError::Transport {
                path: path.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BlobError::Rejected {
                path: path.to_string(),
                status: status.as_u16(),
            }
            .into());
        }
        debug!(path, "blob uploaded");
        Ok(self.public_url(path))
    }
}
