use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::repos::{BlobStore, StoredBlob};

#[derive(Debug, Clone)]
struct Entry {
    body: Bytes,
    uploaded_at: OffsetDateTime,
}

/// Process-local blob store for development and tests.
#[derive(Debug, Clone)]
pub struct MemoryBlobStore {
    base_url: String,
    entries: Arc<RwLock<BTreeMap<String, Entry>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Arc<Self> {
        Self::with_base_url("memory://blob")
    }

    pub fn with_base_url(base_url: &str) -> Arc<Self> {
        Arc::new(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            entries: Arc::new(RwLock::new(BTreeMap::new())),
        })
    }

    /// Stores a blob with an explicit upload time.
    pub async fn insert_at(&self, pathname: &str, body: Bytes, uploaded_at: OffsetDateTime) {
        let mut map = self.entries.write().await;
        map.insert(pathname.to_string(), Entry { body, uploaded_at });
    }

    fn describe(&self, pathname: &str, entry: &Entry) -> StoredBlob {
        StoredBlob {
            url: format!("{}/{}", self.base_url, pathname),
            pathname: pathname.to_string(),
            size: Some(entry.body.len() as u64),
            uploaded_at: Some(entry.uploaded_at),
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, pathname: &str, body: Bytes, _content_type: &str) -> anyhow::Result<StoredBlob> {
        let entry = Entry { body, uploaded_at: OffsetDateTime::now_utc() };
        let blob = self.describe(pathname, &entry);
        self.entries.write().await.insert(pathname.to_string(), entry);
        Ok(blob)
    }

    async fn get(&self, pathname: &str) -> anyhow::Result<Option<Bytes>> {
        Ok(self.entries.read().await.get(pathname).map(|e| e.body.clone()))
    }

    async fn list(&self, prefix: &str) -> anyhow::Result<Vec<StoredBlob>> {
        let map = self.entries.read().await;
        Ok(map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, e)| self.describe(k, e))
            .collect())
    }

    async fn delete(&self, pathnames: &[String]) -> anyhow::Result<()> {
        let mut map = self.entries.write().await;
        for p in pathnames {
            map.remove(p);
        }
        Ok(())
    }
}
