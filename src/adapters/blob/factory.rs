//! Blob store factory

use crate::adapters::blob::http::HttpBlobStore;
use crate::adapters::blob::local::LocalBlobStore;
use crate::adapters::blob::memory::MemoryBlobStore;
use crate::adapters::blob::traits::SharedBlobStore;
use crate::config::schema::{BlobBackend, BlobConfig};
use crate::domain::{FerryError, Result};
use std::sync::Arc;

/// Create a blob store client based on the configuration
///
/// # Errors
///
/// Returns an error if the backend section is missing or the client
/// cannot be built.
pub fn create_blob_store(config: &BlobConfig) -> Result<SharedBlobStore> {
    match config.backend {
        BlobBackend::Local => {
            let local = config.local.as_ref().ok_or_else(|| {
                FerryError::Configuration(
                    "blob.local configuration is required when blob.backend = 'local'".to_string(),
                )
            })?;
            tracing::info!(root = %local.root, "Creating local blob store");
            Ok(Arc::new(LocalBlobStore::new(&local.root)))
        }
        BlobBackend::Http => {
            let http = config.http.as_ref().ok_or_else(|| {
                FerryError::Configuration(
                    "blob.http configuration is required when blob.backend = 'http'".to_string(),
                )
            })?;
            tracing::info!(endpoint = %http.endpoint, "Creating HTTP blob store");
            Ok(Arc::new(HttpBlobStore::new(http)?))
        }
        BlobBackend::Memory => {
            tracing::info!("Creating in-memory blob store");
            Ok(Arc::new(MemoryBlobStore::new()))
        }
    }
}
