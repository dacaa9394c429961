//! PostgreSQL adapter implementing [`KeyValueStore`]
//!
//! Logical tables are rows in `ferry_tables`; items of every table live in
//! `ferry_items` keyed by `(table_name, item_key)`.

use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::store::traits::{
    BatchWriteResponse, KeyValueStore, ScanPage, TableDescription,
};
use crate::domain::{Record, Result, StoreError, TableName};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_postgres::types::ToSql;

/// PostgreSQL implementation of [`KeyValueStore`]
pub struct PostgreSQLAdapter {
    client: Arc<PostgreSQLClient>,
    max_batch_write_items: usize,
    key_schemas: RwLock<HashMap<TableName, Vec<String>>>,
}

impl PostgreSQLAdapter {
    /// Create a new PostgreSQL adapter
    pub fn new(client: PostgreSQLClient, max_batch_write_items: usize) -> Self {
        Self {
            client: Arc::new(client),
            max_batch_write_items,
            key_schemas: RwLock::new(HashMap::new()),
        }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }

    /// Key attributes of a table, cached after the first lookup
    async fn key_attributes(&self, table: &TableName) -> Result<Vec<String>> {
        if let Some(keys) = self.key_schemas.read().await.get(table) {
            return Ok(keys.clone());
        }

        let description = self.describe_table(table).await?;
        Ok(description.key_attributes)
    }
}

/// Build the multi-row upsert for `rows` item rows
///
/// Parameter `$1` is the table name; each row adds a key and an item.
fn upsert_statement(rows: usize) -> String {
    let values: Vec<String> = (0..rows)
        .map(|i| format!("($1, ${}, ${})", 2 * i + 2, 2 * i + 3))
        .collect();

    format!(
        "INSERT INTO ferry_items (table_name, item_key, item) VALUES {} \
         ON CONFLICT (table_name, item_key) DO UPDATE SET item = EXCLUDED.item, updated_at = NOW()",
        values.join(", ")
    )
}

/// Key every record, keeping the last occurrence of a repeated key
///
/// A single upsert statement cannot touch the same row twice.
fn keyed_rows(records: &[Record], key_attributes: &[String]) -> Result<Vec<(String, Value)>> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut rows: Vec<(String, Value)> = Vec::with_capacity(records.len());

    for record in records {
        let key = record.item_key(key_attributes).ok_or_else(|| {
            StoreError::InvalidItem(format!("item is missing key attributes {key_attributes:?}"))
        })?;
        let item = Value::Object(record.as_map().clone());

        match position.get(&key) {
            Some(&index) => rows[index].1 = item,
            None => {
                position.insert(key.clone(), rows.len());
                rows.push((key, item));
            }
        }
    }

    Ok(rows)
}

#[async_trait]
impl KeyValueStore for PostgreSQLAdapter {
    fn backend_name(&self) -> &'static str {
        "postgresql"
    }

    fn max_batch_write_items(&self) -> usize {
        self.max_batch_write_items
    }

    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn describe_table(&self, table: &TableName) -> Result<TableDescription> {
        let rows = self
            .client
            .query(
                "SELECT t.key_attributes, \
                        (SELECT COUNT(*) FROM ferry_items i WHERE i.table_name = t.table_name) \
                 FROM ferry_tables t WHERE t.table_name = $1",
                &[&table.as_str()],
            )
            .await?;

        let row = rows
            .first()
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        let key_attributes: Vec<String> = row.get(0);
        let item_count: i64 = row.get(1);

        self.key_schemas
            .write()
            .await
            .insert(table.clone(), key_attributes.clone());

        Ok(TableDescription {
            name: table.clone(),
            key_attributes,
            item_count: Some(item_count.max(0) as u64),
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

        self.client.ensure_schema().await?;

        let keys = key_attributes.to_vec();
        let inserted = self
            .client
            .execute(
                "INSERT INTO ferry_tables (table_name, key_attributes) VALUES ($1, $2) \
                 ON CONFLICT (table_name) DO NOTHING",
                &[&table.as_str(), &keys],
            )
            .await?;

        if inserted == 0 {
            return Err(StoreError::TableExists(table.to_string()).into());
        }

        tracing::info!(table = %table, key_attributes = ?keys, "Created PostgreSQL table");

        self.key_schemas.write().await.insert(table.clone(), keys.clone());

        Ok(TableDescription {
            name: table.clone(),
            key_attributes: keys,
            item_count: Some(0),
        })
    }

    async fn batch_write(
        &self,
        table: &TableName,
        items: &[Record],
    ) -> Result<BatchWriteResponse> {
        if items.is_empty() {
            return Ok(BatchWriteResponse::complete());
        }

        if items.len() > self.max_batch_write_items {
            return Err(StoreError::InvalidItem(format!(
                "{} items exceed the grouped write limit of {}",
                items.len(),
                self.max_batch_write_items
            ))
            .into());
        }

        let key_attributes = self.key_attributes(table).await?;
        let rows = keyed_rows(items, &key_attributes)?;

        let table_name = table.as_str();
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(rows.len() * 2 + 1);
        params.push(&table_name);
        for (key, item) in &rows {
            params.push(key);
            params.push(item);
        }

        let applied = self
            .client
            .execute(&upsert_statement(rows.len()), &params)
            .await?;

        tracing::trace!(table = %table, rows = applied, "Grouped write applied");

        // The statement is atomic: either every row was applied or it failed.
        Ok(BatchWriteResponse::complete())
    }

    async fn scan_page(
        &self,
        table: &TableName,
        start_key: Option<&str>,
        limit: usize,
    ) -> Result<ScanPage> {
        // Fail with TableNotFound rather than an empty scan for unknown tables
        self.key_attributes(table).await?;

        let limit = limit.max(1);
        let fetch = (limit + 1) as i64;
        let rows = match start_key {
            Some(start) => {
                self.client
                    .query(
                        "SELECT item_key, item FROM ferry_items \
                         WHERE table_name = $1 AND item_key > $2 \
                         ORDER BY item_key LIMIT $3",
                        &[&table.as_str(), &start, &fetch],
                    )
                    .await?
            }
            None => {
                self.client
                    .query(
                        "SELECT item_key, item FROM ferry_items \
                         WHERE table_name = $1 ORDER BY item_key LIMIT $2",
                        &[&table.as_str(), &fetch],
                    )
                    .await?
            }
        };

        let has_more = rows.len() > limit;
        let mut items = Vec::with_capacity(limit);
        let mut last_key = None;

        for row in rows.iter().take(limit) {
            let key: String = row.get(0);
            let value: Value = row.get(1);
            let map = match value {
                Value::Object(map) => map,
                other => {
                    return Err(StoreError::QueryFailed(format!(
                        "item {key} in {table} is not an object: {other}"
                    ))
                    .into())
                }
            };
            items.push(Record::from_map(map));
            last_key = Some(key);
        }

        Ok(ScanPage {
            items,
            next_start_key: if has_more { last_key } else { None },
        })
    }
}
