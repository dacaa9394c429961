//! Key-value store abstraction
//!
//! Backends implement [`KeyValueStore`]. The pipeline only ever talks to a
//! store through this trait, so tests drive the same code paths against the
//! in-memory backend that production drives against PostgreSQL.

use crate::domain::{Record, Result, TableName};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared handle to a store backend
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Metadata of an existing table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescription {
    /// Table name
    pub name: TableName,

    /// Attributes that together form the item key, in order
    pub key_attributes: Vec<String>,

    /// Approximate number of items, when the backend reports it
    pub item_count: Option<u64>,
}

impl TableDescription {
    /// Item key of a record under this table's key schema
    pub fn item_key(&self, record: &Record) -> Option<String> {
        record.item_key(&self.key_attributes)
    }
}

/// Response to a grouped write
///
/// `unprocessed` holds the items the store did not apply because of
/// capacity limits. They must be resubmitted by the caller.
#[derive(Debug, Clone, Default)]
pub struct BatchWriteResponse {
    /// Items not applied
    pub unprocessed: Vec<Record>,
}

impl BatchWriteResponse {
    /// Every item was applied
    pub fn complete() -> Self {
        Self::default()
    }

    /// Whether anything was left unprocessed
    pub fn has_unprocessed(&self) -> bool {
        !self.unprocessed.is_empty()
    }
}

/// One page of a table scan
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    /// Items in key order
    pub items: Vec<Record>,

    /// Exclusive start key of the next page; `None` on the last page
    pub next_start_key: Option<String>,
}

/// Key-value store operations used by the pipeline
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Maximum items accepted by one [`batch_write`](Self::batch_write) call
    fn max_batch_write_items(&self) -> usize;

    /// Check that the backend is reachable
    async fn test_connection(&self) -> Result<()>;

    /// Describe an existing table
    ///
    /// # Errors
    ///
    /// `StoreError::TableNotFound` when the table does not exist.
    async fn describe_table(&self, table: &TableName) -> Result<TableDescription>;

    /// Create a table with the given key attributes
    ///
    /// # Errors
    ///
    /// `StoreError::TableExists` when the table already exists.
    async fn create_table(
        &self,
        table: &TableName,
        key_attributes: &[String],
    ) -> Result<TableDescription>;

    /// Upsert a group of items keyed by the table's key attributes
    ///
    /// At most [`max_batch_write_items`](Self::max_batch_write_items) items
    /// may be submitted. The whole request may be rejected with
    /// `StoreError::Throttled`, or a subset returned as unprocessed.
    async fn batch_write(&self, table: &TableName, items: &[Record])
        -> Result<BatchWriteResponse>;

    /// Read up to `limit` items whose key sorts after `start_key`
    async fn scan_page(
        &self,
        table: &TableName,
        start_key: Option<&str>,
        limit: usize,
    ) -> Result<ScanPage>;
}
