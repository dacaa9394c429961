//! Import command implementation
//!
//! Loads the configured blobs into their store tables.

use super::{run_work_items, RunArgs};
use crate::domain::WorkItem;
use clap::Args;
use tokio::sync::watch;

/// Arguments for the import command
#[derive(Args, Debug)]
pub struct ImportArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

impl ImportArgs {
    /// Execute the import command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting import command");
        run_work_items(config_path, &self.run, is_import, shutdown_signal).await
    }
}

fn is_import(item: &WorkItem) -> bool {
    matches!(item, WorkItem::Import { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlobKey, TableName};

    #[test]
    fn test_keeps_only_imports() {
        let table = TableName::new("users").unwrap();
        assert!(is_import(&WorkItem::Import {
            table: table.clone(),
            blob: BlobKey::new("users.csv").unwrap(),
        }));
        assert!(!is_import(&WorkItem::Export { table }));
    }
}
