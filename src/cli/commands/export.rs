//! Export command implementation
//!
//! Writes one blob per configured table.

use super::{run_work_items, RunArgs};
use crate::domain::WorkItem;
use clap::Args;
use tokio::sync::watch;

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

impl ExportArgs {
    /// Execute the export command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting export command");
        run_work_items(config_path, &self.run, is_export, shutdown_signal).await
    }
}

fn is_export(item: &WorkItem) -> bool {
    matches!(item, WorkItem::Export { .. })
}
