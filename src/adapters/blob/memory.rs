//! In-process blob store

use super::traits::{validate_container, BlobStore};
use crate::domain::{BlobError, BlobKey, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

/// A stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Object body
    pub body: Vec<u8>,
    /// Content type given on write
    pub content_type: String,
}

/// In-memory [`BlobStore`]
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<BTreeMap<(String, String), StoredBlob>>,
    read_only_containers: RwLock<HashSet<String>>,
}

impl MemoryBlobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object
    pub async fn insert(&self, container: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.objects.write().await.insert(
            (container.to_string(), key.to_string()),
            StoredBlob {
                body: body.into(),
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    /// Make writes to a container fail
    pub async fn reject_writes(&self, container: &str) {
        self.read_only_containers
            .write()
            .await
            .insert(container.to_string());
    }

    /// Fetch a stored object
    pub async fn object(&self, container: &str, key: &str) -> Option<StoredBlob> {
        self.objects
            .read()
            .await
            .get(&(container.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys stored in a container, sorted
    pub async fn keys(&self, container: &str) -> Vec<String> {
        self.objects
            .read()
            .await
            .keys()
            .filter(|(c, _)| c == container)
            .map(|(_, k)| k.clone())
            .collect()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, container: &str, key: &BlobKey) -> Result<Vec<u8>> {
        validate_container(container)?;
        self.object(container, key.as_str())
            .await
            .map(|blob| blob.body)
            .ok_or_else(|| BlobError::NotFound(format!("{container}/{key}")).into())
    }

    async fn put(
        &self,
        container: &str,
        key: &BlobKey,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        validate_container(container)?;
        if self.read_only_containers.read().await.contains(container) {
            return Err(BlobError::WriteFailed(format!("{container} is read-only")).into());
        }

        self.objects.write().await.insert(
            (container.to_string(), key.to_string()),
            StoredBlob {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;

    #[tokio::test]
    async fn test_put_get_and_keys() {
        let store = MemoryBlobStore::new();
        let key = BlobKey::new("a.json").unwrap();
        store
            .put("exports", &key, b"[]".to_vec(), "application/json")
            .await
            .unwrap();

        assert_eq!(store.get("exports", &key).await.unwrap(), b"[]");
        assert_eq!(store.keys("exports").await, vec!["a.json".to_string()]);
        assert_eq!(
            store.object("exports", "a.json").await.unwrap().content_type,
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_rejected_write() {
        let store = MemoryBlobStore::new();
        store.reject_writes("exports").await;
        let key = BlobKey::new("a.json").unwrap();

        let err = store
            .put("exports", &key, Vec::new(), "application/json")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BlobWrite);
    }

    #[tokio::test]
    async fn test_missing_object() {
        let store = MemoryBlobStore::new();
        let key = BlobKey::new("nope.csv").unwrap();
        let err = store.get("imports", &key).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Access);
    }
}
