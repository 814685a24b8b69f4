use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use crate::config::BlobCfg;
use crate::repos::{BlobStore, StoredBlob};

const API_VERSION: &str = "7";

/// Blob store backed by a Vercel-Blob style HTTP API.
///
/// Writes, listings and deletes go to the authenticated API endpoint; reads
/// fetch the public object URL directly.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    http: reqwest::Client,
    api_url: String,
    public_base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPage {
    #[serde(default)]
    blobs: Vec<StoredBlob>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

impl HttpBlobStore {
    pub fn from_config(cfg: &BlobCfg, http: reqwest::Client) -> anyhow::Result<Arc<Self>> {
        let token = cfg.token.clone().context("blob token is required for the HTTP blob store")?;
        let public_base_url = cfg
            .public_base_url
            .clone()
            .context("blob public_base_url is required for the HTTP blob store")?;
        Ok(Arc::new(Self {
            http,
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            token,
        }))
    }

    fn public_url(&self, pathname: &str) -> String {
        format!("{}/{}", self.public_base_url, pathname.trim_start_matches('/'))
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(&self, pathname: &str, body: Bytes, content_type: &str) -> anyhow::Result<StoredBlob> {
        let url = format!("{}/{}", self.api_url, pathname.trim_start_matches('/'));
        let size = body.len() as u64;
        let response = self
            .http
            .put(&url)
            .bearer_auth(&self.token)
            .header("x-api-version", API_VERSION)
            .header("x-content-type", content_type)
            .header("x-add-random-suffix", "0")
            .header("x-allow-overwrite", "1")
            .body(body)
            .send()
            .await
            .context("blob put request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("blob put {} failed: {} {}", pathname, status, text);
        }

        let mut blob: StoredBlob = response.json().await.context("failed to parse blob put response")?;
        if blob.size.is_none() {
            blob.size = Some(size);
        }
        Ok(blob)
    }

    async fn get(&self, pathname: &str) -> anyhow::Result<Option<Bytes>> {
        let response = self
            .http
            .get(self.public_url(pathname))
            .send()
            .await
            .context("blob get request failed")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            anyhow::bail!("blob get {} failed: {}", pathname, response.status());
        }
        Ok(Some(response.bytes().await?))
    }

    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<StoredBlob>> {
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query: Vec<(&str, &str)> = vec![("prefix", prefix), ("limit", "1000")];
            if let Some(c) = cursor.as_deref() {
                query.push(("cursor", c));
            }
            let response = self
                .http
                .get(&self.api_url)
                .bearer_auth(&self.token)
                .header("x-api-version", API_VERSION)
                .query(&query)
                .send()
                .await
                .context("blob list request failed")?;

            if !response.status().is_success() {
                anyhow::bail!("blob list {} failed: {}", prefix, response.status());
            }

            let page: ListPage = response.json().await.context("failed to parse blob list response")?;
            out.extend(page.blobs);
            match (page.has_more, page.cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }
        Ok(out)
    }

    async fn delete(&self, pathnames: &[String]) -> anyhow::Result<()> {
        if pathnames.is_empty() {
            return Ok(());
        }
        let urls: Vec<String> = pathnames.iter().map(|p| self.public_url(p)).collect();
        let response = self
            .http
            .post(format!("{}/delete", self.api_url))
            .bearer_auth(&self.token)
            .header("x-api-version", API_VERSION)
            .json(&json!({ "urls": urls }))
            .send()
            .await
            .context("blob delete request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("blob delete failed: {}", response.status());
        }
        Ok(())
    }
}
