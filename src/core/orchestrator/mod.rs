//! Task orchestration
//!
//! - [`coordinator`] - Runs work items with bounded concurrency
//! - [`summary`] - Run outcome and reporting

pub mod coordinator;
pub mod summary;

pub use coordinator::Coordinator;
pub use summary::{RunOutcome, RunSummary};
