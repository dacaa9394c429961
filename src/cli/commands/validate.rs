//! Validate config command implementation
//!
//! Loads and validates the configuration file, then prints a summary.

use super::{EXIT_CONFIG, EXIT_SUCCESS};
use crate::config::{load_config, BlobBackend, FerryConfig, StoreBackend};
use clap::Args;
use secrecy::ExposeSecret;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                return Ok(EXIT_CONFIG);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        print!("{}", describe(&config));
        Ok(EXIT_SUCCESS)
    }
}

/// Human-readable configuration summary; secrets are never shown
fn describe(config: &FerryConfig) -> String {
    let mut lines = vec!["Configuration Summary:".to_string()];
    lines.push(format!("  Log Level: {}", config.application.log_level));
    lines.push(format!("  Dry Run: {}", config.application.dry_run));

    match config.store.backend {
        StoreBackend::PostgreSQL => {
            lines.push("  Store: PostgreSQL".to_string());
            if let Some(pg) = &config.store.postgresql {
                let conn: &str = pg.connection_string.expose_secret().as_ref();
                let host = conn.rsplit_once('@').map(|(_, host)| host).unwrap_or("***");
                lines.push(format!("  PostgreSQL Server: {host}"));
                lines.push(format!("  Max Connections: {}", pg.max_connections));
            }
        }
        StoreBackend::Memory => lines.push("  Store: memory".to_string()),
    }
    lines.push(format!("  Region: {}", config.store.region));
    lines.push(format!(
        "  Grouped Write Cap: {}",
        config.store.max_batch_write_items
    ));

    match config.blob.backend {
        BlobBackend::Local => {
            let root = config.blob.local.as_ref().map(|l| l.root.as_str()).unwrap_or("-");
            lines.push(format!("  Blob Store: local ({root})"));
        }
        BlobBackend::Http => {
            let endpoint = config
                .blob
                .http
                .as_ref()
                .map(|h| h.endpoint.as_str())
                .unwrap_or("-");
            lines.push(format!("  Blob Store: http ({endpoint})"));
        }
        BlobBackend::Memory => lines.push("  Blob Store: memory".to_string()),
    }

    lines.push(format!(
        "  Import Tasks: {} (batch size {}, on parse error: {:?})",
        config.import.tasks.len(),
        config.import.max_batch_size,
        config.import.parse_error_policy
    ));
    lines.push(format!(
        "  Export Tables: {:?} (format {})",
        config.export.tables,
        config.export.format.extension()
    ));
    lines.push(format!(
        "  Retry: {} attempts, {}-{} ms",
        config.retry.max_attempts, config.retry.base_delay_ms, config.retry.max_delay_ms
    ));
    lines.push(format!(
        "  Run: {:?}, concurrency {}",
        config.run.mode, config.run.concurrency
    ));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
