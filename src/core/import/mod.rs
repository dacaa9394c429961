//! Import pipeline: blob body to store table
//!
//! - [`source`] - Lazy record sequence over a delimited or JSON body
//! - [`batcher`] - Groups records into bounded batches
//! - [`writer`] - Grouped writes with retry of unprocessed items

pub mod batcher;
pub mod source;
pub mod writer;

pub use batcher::{Batcher, Batches};
pub use source::RecordSource;
pub use writer::{StoreWriter, WriteAborted};
