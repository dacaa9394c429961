//! Create table command implementation
//!
//! Registers a table and its key attributes with the configured store.

use super::{EXIT_BACKEND, EXIT_CONFIG, EXIT_RUN_FAILED, EXIT_SUCCESS};
use crate::adapters::store::create_store;
use crate::config::load_config;
use crate::domain::{FerryError, StoreError, TableName};
use clap::Args;

/// Arguments for the create-table command
#[derive(Args, Debug)]
pub struct CreateTableArgs {
    /// Table name
    #[arg(long)]
    pub table: String,

    /// Key attribute(s), in order (comma-separated for composite keys)
    #[arg(long, value_delimiter = ',', required = true)]
    pub key: Vec<String>,
}

impl CreateTableArgs {
    /// Execute the create-table command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let table = match TableName::new(self.table.clone()) {
            Ok(table) => table,
            Err(e) => {
                println!("❌ {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let keys: Vec<String> = self
            .key
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if keys.is_empty() {
            println!("❌ At least one key attribute is required");
            return Ok(EXIT_CONFIG);
        }

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        let store = match create_store(&config.store) {
            Ok(store) => store,
            Err(e) => {
                println!("❌ Failed to initialize store: {e}");
                return Ok(EXIT_BACKEND);
            }
        };

        tracing::info!(table = %table, key = ?keys, backend = store.backend_name(), "Creating table");

        match store.create_table(&table, &keys).await {
            Ok(description) => {
                println!(
                    "✅ Created table {} with key ({})",
                    description.name,
                    description.key_attributes.join(", ")
                );
                Ok(EXIT_SUCCESS)
            }
            Err(FerryError::Store(StoreError::TableExists(_))) => {
                println!("⚠️  Table {table} already exists");
                Ok(EXIT_RUN_FAILED)
            }
            Err(e) => {
                tracing::error!(table = %table, error = %e, "Failed to create table");
                println!("❌ Failed to create table {table}: {e}");
                Ok(EXIT_BACKEND)
            }
        }
    }
}
