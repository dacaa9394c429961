//! Export pipeline: store table to blob
//!
//! - [`scanner`] - Paginated table scan into a snapshot
//! - [`exporter`] - Snapshot serialization and blob write

pub mod exporter;
pub mod scanner;

pub use exporter::{run_timestamp, serialize, BlobExporter, ExportReceipt, TIMESTAMP_FORMAT};
pub use scanner::StoreScanner;
