//! Domain models and types for Ferry.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`TableName`], [`BlobKey`])
//! - **Records, batches and snapshots** ([`Record`], [`Batch`], [`Snapshot`])
//! - **Outcomes** ([`WorkItem`], [`WriteOutcome`], [`TaskResult`])
//! - **Error types** ([`FerryError`], [`StoreError`], [`BlobError`], [`ParseError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, FerryError>`]. Each error maps
//! to an [`ErrorKind`] that decides whether it is retried, aborts the current
//! task, or is reported per item:
//!
//! ```rust
//! use ferry::domain::{ErrorKind, FerryError, StoreError};
//!
//! let err = FerryError::from(StoreError::Throttled("capacity".to_string()));
//! assert_eq!(err.kind(), ErrorKind::Throttling);
//! assert!(err.is_retryable());
//! ```

pub mod errors;
pub mod ids;
pub mod outcome;
pub mod record;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::{BlobError, ErrorKind, FerryError, ParseError, StoreError};
pub use ids::{BlobKey, TableName};
pub use outcome::{
    FailureReason, ItemFailure, TaskError, TaskResult, TaskStatus, WorkItem, WriteOutcome,
};
pub use record::{Batch, Record, Snapshot};
pub use result::Result;
