//! Key-value store abstraction and backends
//!
//! The [`KeyValueStore`] trait is the only surface the pipeline uses. The
//! PostgreSQL backend lives in [`crate::adapters::postgresql`]; the
//! in-memory backend is here.

pub mod factory;
pub mod memory;
pub mod traits;

pub use factory::create_store;
pub use memory::{MemoryStore, ThrottleMode};
pub use traits::{BatchWriteResponse, KeyValueStore, ScanPage, SharedStore, TableDescription};
