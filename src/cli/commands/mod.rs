//! CLI command implementations
//!
//! `import` and `export` share [`RunArgs`] and [`run_work_items`]; the
//! remaining commands are self-contained.

pub mod create_table;
pub mod export;
pub mod import;
pub mod init;
pub mod validate;

use crate::config::{load_config, FerryConfig, RunMode};
use crate::core::orchestrator::{Coordinator, RunSummary};
use crate::domain::WorkItem;
use clap::Args;
use tokio::sync::watch;

/// Exit code of a successful run
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code of an unsuccessful run
pub const EXIT_RUN_FAILED: i32 = 1;
/// Exit code of a configuration error
pub const EXIT_CONFIG: i32 = 2;
/// Exit code of a backend initialisation failure
pub const EXIT_BACKEND: i32 = 4;
/// Exit code of a fatal error
pub const EXIT_FATAL: i32 = 5;
/// Exit code after SIGINT/SIGTERM
pub const EXIT_INTERRUPTED: i32 = 130;

/// Options shared by `import` and `export`
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Dry run mode - read and serialize without writing
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Only run work items for these tables (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub table: Vec<String>,

    /// Override run mode (best-effort or strict)
    #[arg(long)]
    pub mode: Option<RunMode>,
}

impl RunArgs {
    /// Apply CLI overrides to a loaded configuration
    pub fn apply(&self, config: &mut FerryConfig) {
        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }

        if let Some(mode) = self.mode {
            tracing::info!(mode = ?mode, "Overriding run mode from CLI");
            config.run.mode = mode;
        }
    }

    /// Keep the items selected by `--table`
    pub fn select(&self, items: Vec<WorkItem>) -> Vec<WorkItem> {
        if self.table.is_empty() {
            return items;
        }
        items
            .into_iter()
            .filter(|item| self.table.iter().any(|t| t == item.table().as_str()))
            .collect()
    }
}

/// Load the configuration, run the selected work items and report
///
/// `keep` picks the work items of the calling command.
pub async fn run_work_items(
    config_path: &str,
    args: &RunArgs,
    keep: fn(&WorkItem) -> bool,
    shutdown_signal: watch::Receiver<bool>,
) -> anyhow::Result<i32> {
    let mut config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            eprintln!("❌ {e}");
            return Ok(EXIT_CONFIG);
        }
    };

    args.apply(&mut config);
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Configuration validation failed");
        eprintln!("❌ Configuration validation failed: {e}");
        return Ok(EXIT_CONFIG);
    }

    let items = match config.work_items() {
        Ok(items) => args.select(items.into_iter().filter(keep).collect()),
        Err(e) => {
            eprintln!("❌ Configuration validation failed: {e}");
            return Ok(EXIT_CONFIG);
        }
    };

    if items.is_empty() && !args.table.is_empty() {
        eprintln!("❌ No configured work items match --table {}", args.table.join(","));
        return Ok(EXIT_CONFIG);
    }

    let dry_run = config.application.dry_run;
    let interrupted = shutdown_signal.clone();

    tracing::info!("Creating coordinator");
    let coordinator = match Coordinator::from_config(config, shutdown_signal) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create coordinator");
            eprintln!("❌ Failed to initialize backends: {e}");
            return Ok(EXIT_BACKEND);
        }
    };

    if let Err(e) = coordinator.store().test_connection().await {
        tracing::error!(error = %e, "Store connection test failed");
        eprintln!("❌ Failed to connect to the store: {e}");
        return Ok(EXIT_BACKEND);
    }

    if !args.json {
        if dry_run {
            println!("🔍 DRY RUN MODE - No data will be written");
        }
        println!("🚀 Running {} task(s)...", items.len());
        println!();
    }

    let summary = coordinator.run(items).await;
    report(&summary, args.json)?;

    let exit_code = if *interrupted.borrow() {
        tracing::info!("Run interrupted by user signal");
        if !args.json {
            println!("⚠️  Run interrupted; unfinished records were recorded as cancelled.");
        }
        EXIT_INTERRUPTED
    } else if summary.is_successful() {
        EXIT_SUCCESS
    } else {
        EXIT_RUN_FAILED
    };

    Ok(exit_code)
}

fn report(summary: &RunSummary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    print!("{}", summary.render_text());
    println!();
    if summary.is_successful() {
        println!("✅ {}", summary.message);
    } else {
        println!("⚠️  {}", summary.message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BlobKey, TableName};

    fn items() -> Vec<WorkItem> {
        vec![
            WorkItem::Export {
                table: TableName::new("orders").unwrap(),
            },
            WorkItem::Import {
                table: TableName::new("users").unwrap(),
                blob: BlobKey::new("users.csv").unwrap(),
            },
        ]
    }

    #[test]
    fn test_select_without_filter_keeps_everything() {
        assert_eq!(RunArgs::default().select(items()).len(), 2);
    }

    #[test]
    fn test_select_by_table() {
        let args = RunArgs {
            table: vec!["users".to_string()],
            ..Default::default()
        };
        let selected = args.select(items());
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].table().as_str(), "users");
    }
}
