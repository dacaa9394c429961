//! In-process key-value store
//!
//! Tables live in a `BTreeMap` keyed by item key, so scans come back in key
//! order like the PostgreSQL backend. Throttling and access failures can be
//! injected to exercise the writer's retry paths.

use super::traits::{BatchWriteResponse, KeyValueStore, ScanPage, TableDescription};
use crate::domain::{Record, Result, StoreError, TableName};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use tokio::sync::RwLock;

/// How `batch_write` responds to capacity pressure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThrottleMode {
    /// Apply every item
    #[default]
    None,
    /// Leave every item unprocessed on every call
    Always,
    /// Leave the second half of each request unprocessed for the first `n` calls
    PartialFor(usize),
    /// Reject the whole request with a throttling error for the first `n` calls
    RejectFor(usize),
}

#[derive(Debug, Default)]
struct MemoryTable {
    key_attributes: Vec<String>,
    items: BTreeMap<String, Record>,
}

#[derive(Debug, Default)]
struct Faults {
    throttle: ThrottleMode,
    throttled_tables: HashSet<TableName>,
    denied_tables: HashSet<TableName>,
    throttled_scans: usize,
    write_calls: usize,
    scan_calls: usize,
}

/// In-memory [`KeyValueStore`]
#[derive(Debug)]
pub struct MemoryStore {
    max_batch_write_items: usize,
    tables: RwLock<HashMap<TableName, MemoryTable>>,
    faults: RwLock<Faults>,
}

impl MemoryStore {
    /// Creates an empty store with the given grouped-write cap
    pub fn new(max_batch_write_items: usize) -> Self {
        Self {
            max_batch_write_items: max_batch_write_items.max(1),
            tables: RwLock::new(HashMap::new()),
            faults: RwLock::new(Faults::default()),
        }
    }

    /// Set the throttling behaviour of `batch_write`
    pub async fn set_throttle(&self, mode: ThrottleMode) {
        self.faults.write().await.throttle = mode;
    }

    /// Restrict throttling to the given table; others are never throttled
    pub async fn throttle_only(&self, table: &TableName) {
        self.faults.write().await.throttled_tables.insert(table.clone());
    }

    /// Make every operation on a table fail with an access error
    pub async fn deny_access(&self, table: &TableName) {
        self.faults.write().await.denied_tables.insert(table.clone());
    }

    /// Throttle the next `n` scan pages
    pub async fn throttle_scans(&self, n: usize) {
        self.faults.write().await.throttled_scans = n;
    }

    /// Number of `batch_write` calls made so far
    pub async fn write_calls(&self) -> usize {
        self.faults.read().await.write_calls
    }

    /// Number of `scan_page` calls made so far
    pub async fn scan_calls(&self) -> usize {
        self.faults.read().await.scan_calls
    }

    /// Number of items stored in a table
    pub async fn item_count(&self, table: &TableName) -> usize {
        self.tables
            .read()
            .await
            .get(table)
            .map(|t| t.items.len())
            .unwrap_or(0)
    }

    /// Fetch the stored item with the same key as `item`
    pub async fn get_item(&self, table: &TableName, item: &Record) -> Option<Record> {
        let tables = self.tables.read().await;
        let entry = tables.get(table)?;
        let key = item.item_key(&entry.key_attributes)?;
        entry.items.get(&key).cloned()
    }

    async fn check_access(&self, table: &TableName) -> Result<()> {
        if self.faults.read().await.denied_tables.contains(table) {
            return Err(StoreError::AccessDenied(format!("not authorized for table {table}")).into());
        }
        Ok(())
    }

    /// Decide how many of `len` items to leave unprocessed, or reject outright
    async fn apply_throttle(&self, table: &TableName, len: usize) -> Result<usize> {
        let mut faults = self.faults.write().await;
        faults.write_calls += 1;

        if !faults.throttled_tables.is_empty() && !faults.throttled_tables.contains(table) {
            return Ok(0);
        }

        match faults.throttle {
            ThrottleMode::None => Ok(0),
            ThrottleMode::Always => Ok(len),
            ThrottleMode::PartialFor(0) | ThrottleMode::RejectFor(0) => {
                faults.throttle = ThrottleMode::None;
                Ok(0)
            }
            ThrottleMode::PartialFor(n) => {
                faults.throttle = ThrottleMode::PartialFor(n - 1);
                Ok(len / 2)
            }
            ThrottleMode::RejectFor(n) => {
                faults.throttle = ThrottleMode::RejectFor(n - 1);
                Err(StoreError::Throttled(format!(
                    "provisioned throughput exceeded for table {table}"
                ))
                .into())
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(25)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn max_batch_write_items(&self) -> usize {
        self.max_batch_write_items
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn describe_table(&self, table: &TableName) -> Result<TableDescription> {
        self.check_access(table).await?;
        let tables = self.tables.read().await;
        let entry = tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        Ok(TableDescription {
            name: table.clone(),
            key_attributes: entry.key_attributes.clone(),
            item_count: Some(entry.items.len() as u64),
        })
    }

    async fn create_table(
        &self,
        table: &TableName,
        key_attributes: &[String],
    ) -> Result<TableDescription> {
        if key_attributes.is_empty() {
            return Err(StoreError::InvalidItem(format!(
                "table {table} needs at least one key attribute"
            ))
            .into());
        }

        let mut tables = self.tables.write().await;
        if tables.contains_key(table) {
            return Err(StoreError::TableExists(table.to_string()).into());
        }
        tables.insert(
            table.clone(),
            MemoryTable {
                key_attributes: key_attributes.to_vec(),
                items: BTreeMap::new(),
            },
        );

        Ok(TableDescription {
            name: table.clone(),
            key_attributes: key_attributes.to_vec(),
            item_count: Some(0),
        })
    }

    async fn batch_write(
        &self,
        table: &TableName,
        items: &[Record],
    ) -> Result<BatchWriteResponse> {
        self.check_access(table).await?;

        if items.len() > self.max_batch_write_items {
            return Err(StoreError::InvalidItem(format!(
                "{} items exceed the grouped write limit of {}",
                items.len(),
                self.max_batch_write_items
            ))
            .into());
        }

        let unprocessed_count = self.apply_throttle(table, items.len()).await?;
        let split = items.len() - unprocessed_count;
        let (applied, unprocessed) = items.split_at(split);

        let mut tables = self.tables.write().await;
        let entry = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        for item in applied {
            let key = item.item_key(&entry.key_attributes).ok_or_else(|| {
                StoreError::InvalidItem(format!("item is missing key attributes {:?}", entry.key_attributes))
            })?;
            entry.items.insert(key, item.clone());
        }

        Ok(BatchWriteResponse {
            unprocessed: unprocessed.to_vec(),
        })
    }

    async fn scan_page(
        &self,
        table: &TableName,
        start_key: Option<&str>,
        limit: usize,
    ) -> Result<ScanPage> {
        self.check_access(table).await?;

        {
            let mut faults = self.faults.write().await;
            faults.scan_calls += 1;
            if faults.throttled_scans > 0 {
                faults.throttled_scans -= 1;
                return Err(StoreError::Throttled(format!("scan of {table} throttled")).into());
            }
        }

        let tables = self.tables.read().await;
        let entry = tables
            .get(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        let lower = match start_key {
            Some(key) => Bound::Excluded(key.to_string()),
            None => Bound::Unbounded,
        };
        let mut range = entry.items.range((lower, Bound::Unbounded));

        let mut items = Vec::new();
        let mut last_key = None;
        for (key, item) in range.by_ref().take(limit.max(1)) {
            items.push(item.clone());
            last_key = Some(key.clone());
        }

        let next_start_key = if range.next().is_some() { last_key } else { None };

        Ok(ScanPage {
            items,
            next_start_key,
        })
    }
}
