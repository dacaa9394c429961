//! Blob store abstraction and backends
//!
//! - [`local`] - directory on the local filesystem
//! - [`http`] - HTTP object endpoint
//! - [`memory`] - in-process map

pub mod factory;
pub mod http;
pub mod local;
pub mod memory;
pub mod traits;

pub use factory::create_blob_store;
pub use http::HttpBlobStore;
pub use local::LocalBlobStore;
pub use memory::{MemoryBlobStore, StoredBlob};
pub use traits::{BlobStore, SharedBlobStore};
