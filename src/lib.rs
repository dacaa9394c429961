// Ferry - Bulk table import/export between key-value stores and blob storage
// Copyright (c) 2025 Ferry Contributors
// Licensed under the MIT License

//! # Ferry - bulk table import/export
//!
//! Ferry moves tabular data between a key-value store and a blob store.
//! Export scans a store table and writes one structured blob per table.
//! Import streams delimited (or JSON) records from blobs and loads them into
//! a store table under its write-capacity constraints.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Import and export pipelines, retry, cancellation, orchestration
//! - [`adapters`] - Key-value store (PostgreSQL, memory) and blob store
//!   (local, HTTP, memory) backends
//! - [`domain`] - Records, batches, outcomes and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferry::config::load_config;
//! use ferry::core::orchestrator::Coordinator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("ferry.toml")?;
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//!     let coordinator = Coordinator::from_config(config, shutdown_rx)?;
//!     let summary = coordinator.run(coordinator.work_items()?).await;
//!
//!     println!("{} records written", summary.total_written());
//!     Ok(())
//! }
//! ```
//!
//! ## Write path
//!
//! Records are grouped into batches of `import.max_batch_size`. Each batch is
//! split into chunks of at most `store.max_batch_write_items`, and items the
//! store leaves unprocessed are resubmitted with exponential backoff:
//!
//! ```rust
//! use ferry::core::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy {
//!     max_attempts: 5,
//!     base_delay: Duration::from_millis(100),
//!     max_delay: Duration::from_secs(1),
//! };
//! assert_eq!(policy.delay_for(1), Duration::from_millis(100));
//! assert_eq!(policy.delay_for(3), Duration::from_millis(400));
//! assert_eq!(policy.delay_for(10), Duration::from_secs(1));
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`domain::Result`]. Errors are classified
//! by [`domain::ErrorKind`]: throttling is retried, access and blob write
//! errors abort only the current task.
//!
//! ## Logging
//!
//! Ferry uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! tracing::info!(table = "orders", items = 1200, "Table scanned");
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
