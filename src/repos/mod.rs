use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Metadata for an object in blob storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredBlob {
    pub url: String,
    pub pathname: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub uploaded_at: Option<OffsetDateTime>,
}

/// Key-value object storage addressed by pathname.
///
/// Share records, short links and generated images all live here.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, pathname: &str, body: Bytes, content_type: &str) -> anyhow::Result<StoredBlob>;
    /// `Ok(None)` when nothing is stored under `pathname`.
    async fn get(&self, pathname: &str) -> anyhow::Result<Option<Bytes>>;
    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<StoredBlob>>;
    async fn delete(&self, pathnames: &[String]) -> anyhow::Result<()>;
}

/// Reads and decodes a JSON document.
pub async fn get_json<T: serde::de::DeserializeOwned>(
    store: &dyn BlobStore,
    pathname: &str,
) -> anyhow::Result<Option<T>> {
    match store.get(pathname).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

pub async fn put_json<T: Serialize>(store: &dyn BlobStore, pathname: &str, value: &T) -> anyhow::Result<StoredBlob> {
    let body = serde_json::to_vec(value)?;
    store.put(pathname, Bytes::from(body), "application/json").await
}

pub mod http;
pub mod memory;
