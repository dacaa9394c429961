//! Core business logic for Ferry.
//!
//! # Modules
//!
//! - [`import`] - Record source, batcher and store writer
//! - [`export`] - Store scanner and blob exporter
//! - [`orchestrator`] - Runs work items and summarizes the run
//! - [`retry`] - Bounded exponential backoff
//! - [`cancel`] - Task deadlines and shutdown
//!
//! # Workflow
//!
//! 1. **Plan**: Turn the configuration into work items (exports first)
//! 2. **Import**: Parse the blob, batch records, write chunks with retry
//! 3. **Export**: Scan the table page by page, write one blob per table
//! 4. **Report**: Collect a task result per work item into a run summary
//!
//! # Example
//!
//! ```rust,no_run
//! use ferry::config::load_config;
//! use ferry::core::orchestrator::Coordinator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("ferry.toml")?;
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let coordinator = Coordinator::from_config(config, shutdown_rx)?;
//! let items = coordinator.work_items()?;
//! let summary = coordinator.run(items).await;
//!
//! println!("{}", summary.render_text());
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod export;
pub mod import;
pub mod orchestrator;
pub mod retry;
