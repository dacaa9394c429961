//! Store client factory
//!
//! Builds the configured backend once; the handle is shared by every task.

use crate::adapters::postgresql::{PostgreSQLAdapter, PostgreSQLClient};
use crate::adapters::store::memory::MemoryStore;
use crate::adapters::store::traits::SharedStore;
use crate::config::schema::{StoreBackend, StoreConfig};
use crate::domain::{FerryError, Result};
use std::sync::Arc;

/// Create a key-value store client based on the configuration
///
/// # Errors
///
/// Returns an error if the backend section is missing or the client
/// cannot be built.
pub fn create_store(config: &StoreConfig) -> Result<SharedStore> {
    match config.backend {
        StoreBackend::PostgreSQL => {
            let pg_config = config.postgresql.as_ref().ok_or_else(|| {
                FerryError::Configuration(
                    "store.postgresql configuration is required when store.backend = 'postgresql'"
                        .to_string(),
                )
            })?;

            tracing::info!("Creating PostgreSQL store client");
            let client = PostgreSQLClient::new(pg_config.clone())?;
            Ok(Arc::new(PostgreSQLAdapter::new(
                client,
                config.max_batch_write_items,
            )))
        }
        StoreBackend::Memory => {
            tracing::info!("Creating in-memory store");
            Ok(Arc::new(MemoryStore::new(config.max_batch_write_items)))
        }
    }
}
