//! External system integrations for Ferry.
//!
//! - [`store`] - key-value store abstraction, factory and in-memory backend
//! - [`postgresql`] - PostgreSQL key-value store backend
//! - [`blob`] - blob store abstraction and backends
//!
//! # Design Pattern
//!
//! Adapters isolate external systems behind async traits. Clients are built
//! once by the factories and shared as `Arc<dyn Trait>` handles:
//!
//! ```rust,no_run
//! use ferry::adapters::{blob::create_blob_store, store::create_store};
//! use ferry::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("ferry.toml")?;
//! let store = create_store(&config.store)?;
//! let blobs = create_blob_store(&config.blob)?;
//! println!("{} -> {}", store.backend_name(), blobs.backend_name());
//! # Ok(())
//! # }
//! ```

pub mod blob;
pub mod postgresql;
pub mod store;
