//! Blob store abstraction

use crate::domain::{BlobError, BlobKey, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Shared handle to a blob backend
pub type SharedBlobStore = Arc<dyn BlobStore>;

/// Object storage operations used by the pipeline
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Read a whole object
    ///
    /// # Errors
    ///
    /// `BlobError::NotFound` when the object does not exist.
    async fn get(&self, container: &str, key: &BlobKey) -> Result<Vec<u8>>;

    /// Write a whole object, replacing any previous version
    async fn put(
        &self,
        container: &str,
        key: &BlobKey,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;
}

/// Containers are single path segments
pub fn validate_container(container: &str) -> Result<()> {
    if container.is_empty()
        || container == "."
        || container == ".."
        || container.contains('/')
        || container.contains('\\')
    {
        return Err(BlobError::AccessDenied(format!("invalid container name '{container}'")).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_container() {
        assert!(validate_container("exports").is_ok());
        assert!(validate_container("").is_err());
        assert!(validate_container("..").is_err());
        assert!(validate_container("a/b").is_err());
    }
}
