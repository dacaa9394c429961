//! Domain error types
//!
//! This module defines the error hierarchy for Ferry. Backend errors are
//! classified into a small taxonomy ([`ErrorKind`]) that drives retry and
//! per-task failure handling. No third-party error types are exposed.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main Ferry error type
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
pub enum FerryError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Key-value store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Blob store errors
    #[error("Blob store error: {0}")]
    Blob(#[from] BlobError),

    /// Malformed input
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Deadline exceeded or shutdown requested
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl FerryError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            FerryError::Configuration(_) => ErrorKind::Configuration,
            FerryError::Store(e) => e.kind(),
            FerryError::Blob(e) => e.kind(),
            FerryError::Parse(_) => ErrorKind::Parse,
            FerryError::Cancelled(_) => ErrorKind::Cancelled,
            FerryError::Serialization(_) | FerryError::Io(_) | FerryError::Other(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether the operation that produced this error may be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            FerryError::Store(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Error taxonomy used in task results and summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input row or header
    Parse,
    /// Store or blob resource unreachable or unauthorized
    Access,
    /// Transient capacity rejection
    Throttling,
    /// Export write failed
    BlobWrite,
    /// Deadline exceeded or shutdown requested
    Cancelled,
    /// Invalid configuration
    Configuration,
    /// Anything else
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Parse => "parse",
            ErrorKind::Access => "access",
            ErrorKind::Throttling => "throttling",
            ErrorKind::BlobWrite => "blob_write",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Key-value store errors
///
/// Errors that occur when interacting with a key-value store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Table does not exist
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Table already exists
    #[error("Table already exists: {0}")]
    TableExists(String),

    /// Credentials rejected or operation not permitted
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Request rejected because of provisioned capacity limits
    #[error("Request throttled: {0}")]
    Throttled(String),

    /// Backend temporarily unreachable (connection, timeout)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Item rejected by the store
    #[error("Invalid item: {0}")]
    InvalidItem(String),

    /// Query or statement failed
    #[error("Query failed: {0}")]
    QueryFailed(String),
}

impl StoreError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::TableNotFound(_) | StoreError::AccessDenied(_) => ErrorKind::Access,
            StoreError::Throttled(_) | StoreError::Unavailable(_) => ErrorKind::Throttling,
            StoreError::TableExists(_)
            | StoreError::InvalidItem(_)
            | StoreError::QueryFailed(_) => ErrorKind::Internal,
        }
    }

    /// Throttling and transient unavailability are retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Throttled(_) | StoreError::Unavailable(_))
    }

    /// Whether this is a capacity rejection
    pub fn is_throttled(&self) -> bool {
        matches!(self, StoreError::Throttled(_))
    }
}

/// Blob store errors
#[derive(Debug, Error)]
pub enum BlobError {
    /// Object or container does not exist
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// Credentials rejected or operation not permitted
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Writing the object failed
    #[error("Failed to write blob: {0}")]
    WriteFailed(String),

    /// Reading the object failed
    #[error("Failed to read blob: {0}")]
    ReadFailed(String),
}

impl BlobError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlobError::NotFound(_) | BlobError::AccessDenied(_) | BlobError::ReadFailed(_) => {
                ErrorKind::Access
            }
            BlobError::WriteFailed(_) => ErrorKind::BlobWrite,
        }
    }
}

/// Malformed input
///
/// `row` is the 1-based data row (the header is row 0).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("row {row}: {message}")]
pub struct ParseError {
    /// Row number
    pub row: usize,
    /// What was wrong with it
    pub message: String,
}

impl ParseError {
    /// Creates a new parse error
    pub fn new(row: usize, message: impl Into<String>) -> Self {
        Self {
            row,
            message: message.into(),
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for FerryError {
    fn from(err: std::io::Error) -> Self {
        FerryError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for FerryError {
    fn from(err: serde_json::Error) -> Self {
        FerryError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for FerryError {
    fn from(err: toml::de::Error) -> Self {
        FerryError::Configuration(format!("TOML parse error: {err}"))
    }
}

// Conversion from csv writer errors
impl From<csv::Error> for FerryError {
    fn from(err: csv::Error) -> Self {
        FerryError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ferry_error_display() {
        let err = FerryError::Configuration("Invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid config");
    }

    #[test]
    fn test_store_error_conversion() {
        let store_err = StoreError::Throttled("capacity exceeded".to_string());
        let err: FerryError = store_err.into();
        assert!(matches!(err, FerryError::Store(_)));
        assert_eq!(err.kind(), ErrorKind::Throttling);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_access_errors_are_not_retryable() {
        let err: FerryError = StoreError::TableNotFound("users".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Access);
        assert!(!err.is_retryable());

        let err: FerryError = StoreError::AccessDenied("role".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Access);
    }

    #[test]
    fn test_blob_error_kinds() {
        assert_eq!(
            FerryError::from(BlobError::WriteFailed("500".to_string())).kind(),
            ErrorKind::BlobWrite
        );
        assert_eq!(
            FerryError::from(BlobError::NotFound("x.csv".to_string())).kind(),
            ErrorKind::Access
        );
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new(3, "expected 2 fields, found 3");
        assert_eq!(err.to_string(), "row 3: expected 2 fields, found 3");
        assert_eq!(FerryError::from(err).kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::Throttling.to_string(), "throttling");
        assert_eq!(ErrorKind::BlobWrite.to_string(), "blob_write");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let err: FerryError = io_err.into();
        assert!(matches!(err, FerryError::Io(_)));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: FerryError = json_err.into();
        assert!(matches!(err, FerryError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let err: FerryError = toml_err.into();
        assert!(matches!(err, FerryError::Configuration(_)));
        assert!(err.to_string().contains("TOML parse error"));
    }
}
