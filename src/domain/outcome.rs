//! Work items and their outcomes
//!
//! These types carry the bookkeeping of the pipeline: what was written, what
//! permanently failed and why, and the per-task aggregate reported to the
//! user. Every record observed by a task ends up either counted as written or
//! listed as an [`ItemFailure`].

use super::errors::{ErrorKind, FerryError};
use super::ids::{BlobKey, TableName};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One configured unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkItem {
    /// Load a blob into a store table
    Import {
        /// Destination table
        table: TableName,
        /// Source blob
        blob: BlobKey,
    },
    /// Write a snapshot of a store table to the blob store
    Export {
        /// Source table
        table: TableName,
    },
}

impl WorkItem {
    /// The store table this item touches
    pub fn table(&self) -> &TableName {
        match self {
            WorkItem::Import { table, .. } | WorkItem::Export { table } => table,
        }
    }

    /// Short label used in logs and summaries
    pub fn label(&self) -> String {
        match self {
            WorkItem::Import { table, blob } => format!("import {blob} -> {table}"),
            WorkItem::Export { table } => format!("export {table}"),
        }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Why an item was not transferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Still throttled after the last attempt
    Throttled,
    /// Store unreachable after the last attempt
    Unavailable,
    /// Deadline exceeded or shutdown requested
    Cancelled,
    /// Missing or empty key attribute
    InvalidItem,
    /// Rejected by the store
    Rejected,
    /// Malformed source row
    Parse,
    /// Task aborted by a fatal error before the item was written
    Aborted,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::Throttled => "throttled",
            FailureReason::Unavailable => "unavailable",
            FailureReason::Cancelled => "cancelled",
            FailureReason::InvalidItem => "invalid_item",
            FailureReason::Rejected => "rejected",
            FailureReason::Parse => "parse",
            FailureReason::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// A record that was permanently not transferred
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Item key, when the record had one
    pub item_key: Option<String>,
    /// Source row, when known
    pub row: Option<usize>,
    /// Classified reason
    pub reason: FailureReason,
    /// Detail
    pub message: String,
}

impl ItemFailure {
    /// Creates a new failure
    pub fn new(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            item_key: None,
            row: None,
            reason,
            message: message.into(),
        }
    }

    /// Sets the item key
    pub fn with_key(mut self, key: Option<String>) -> Self {
        self.item_key = key;
        self
    }

    /// Sets the source row
    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }
}

/// Result of writing one batch
#[derive(Debug, Clone, Default)]
pub struct WriteOutcome {
    /// Keys of items the store acknowledged
    pub written: Vec<String>,
    /// Items that will not be written
    pub failures: Vec<ItemFailure>,
    /// Grouped-write submissions made for this batch
    pub attempts: usize,
    /// Cancellation interrupted this batch
    pub cancelled: bool,
}

impl WriteOutcome {
    /// Number of records accounted for
    pub fn accounted(&self) -> usize {
        self.written.len() + self.failures.len()
    }
}

/// Fatal error that ended a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    /// Classified kind
    pub kind: ErrorKind,
    /// Message
    pub message: String,
}

impl From<&FerryError> for TaskError {
    fn from(err: &FerryError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Overall status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Everything transferred
    Succeeded,
    /// Task ran to the end but some items failed
    CompletedWithFailures,
    /// A fatal error ended the task
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::CompletedWithFailures => "completed_with_failures",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Aggregate result of one work item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// The work item
    pub work_item: WorkItem,
    /// Records read from the source (import) or scanned (export)
    pub records_observed: usize,
    /// Records written to the store (import) or blob (export)
    pub records_written: usize,
    /// Permanently failed items
    pub failures: Vec<ItemFailure>,
    /// Fatal error, if the task was aborted
    pub error: Option<TaskError>,
    /// Blob written by an export task
    pub blob_key: Option<String>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl TaskResult {
    /// Creates an empty result for a work item
    pub fn new(work_item: WorkItem) -> Self {
        Self {
            work_item,
            records_observed: 0,
            records_written: 0,
            failures: Vec::new(),
            error: None,
            blob_key: None,
            duration_ms: 0,
        }
    }

    /// Creates a result for a task that failed before doing any work
    pub fn failed(work_item: WorkItem, err: &FerryError) -> Self {
        let mut result = Self::new(work_item);
        result.fail(err);
        result
    }

    /// Record a fatal error
    pub fn fail(&mut self, err: &FerryError) {
        self.error = Some(TaskError::from(err));
    }

    /// Record a failure for one observed record
    pub fn add_failure(&mut self, failure: ItemFailure) {
        self.records_observed += 1;
        self.failures.push(failure);
    }

    /// Merge a batch outcome into this result
    pub fn absorb(&mut self, outcome: WriteOutcome) {
        self.records_observed += outcome.accounted();
        self.records_written += outcome.written.len();
        self.failures.extend(outcome.failures);
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    /// Task status
    pub fn status(&self) -> TaskStatus {
        if self.error.is_some() {
            TaskStatus::Failed
        } else if self.failures.is_empty() {
            TaskStatus::Succeeded
        } else {
            TaskStatus::CompletedWithFailures
        }
    }

    /// No fatal error and no permanent failures
    pub fn is_successful(&self) -> bool {
        self.status() == TaskStatus::Succeeded
    }

    /// Every observed record is either written or listed as a failure
    pub fn is_fully_accounted(&self) -> bool {
        self.records_observed == self.records_written + self.failures.len()
    }

    /// Number of failures with a given reason
    pub fn failures_with_reason(&self, reason: FailureReason) -> usize {
        self.failures.iter().filter(|f| f.reason == reason).count()
    }
}
