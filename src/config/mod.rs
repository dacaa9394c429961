//! Configuration management for Ferry.
//!
//! # Overview
//!
//! Ferry reads a TOML configuration file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `FERRY_<SECTION>_<KEY>` overrides
//! - Default values for optional settings
//! - Validation of every section on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ferry::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("ferry.toml")?;
//!
//! println!("Region: {}", config.store.region);
//! println!("Batch size: {}", config.import.max_batch_size);
//! for item in config.work_items()? {
//!     println!("{item}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry run
//! - [`StoreConfig`] - Key-value store backend, region and capacity limits
//! - [`BlobConfig`] - Blob store backend
//! - [`ImportConfig`] - Import work items, batch size, parse error policy
//! - [`ExportConfig`] - Export tables, key prefix and format
//! - [`RetryConfig`] - Backoff for throttled requests
//! - [`RunConfig`] - Run mode, concurrency and task deadline
//! - [`LoggingConfig`] - Local file logging
//!
//! # Example Configuration
//!
//! ```toml
//! [store]
//! backend = "postgresql"
//! region = "eu-west-1"
//!
//! [store.postgresql]
//! connection_string = "${FERRY_PG_CONNECTION}"
//!
//! [blob]
//! backend = "local"
//!
//! [blob.local]
//! root = "/data/blobs"
//!
//! [import]
//! source_container = "incoming"
//!
//! [[import.tasks]]
//! table_name = "customers"
//! blob_key = "customers.csv"
//!
//! [export]
//! destination_container = "snapshots"
//! tables = ["orders"]
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, load_config_from_str};
pub use schema::{
    ApplicationConfig, BlobBackend, BlobConfig, ExportConfig, ExportFormat, FerryConfig,
    HttpBlobConfig, ImportConfig, ImportTaskConfig, LocalBlobConfig, LoggingConfig,
    ParseErrorPolicy, PostgreSQLConfig, RetryConfig, RunConfig, RunMode, SourceFormat,
    StoreBackend, StoreConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
