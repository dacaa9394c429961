//! Logging and observability
//!
//! Structured logging through `tracing`, with a console layer and an
//! optional JSON file layer with rotation.
//!
//! # Example
//!
//! ```no_run
//! use ferry::logging::init_logging;
//! use ferry::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(table = "orders", "Export started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of a task
///
/// # Example
///
/// ```no_run
/// use ferry::log_task_start;
///
/// log_task_start!("export orders");
/// ```
#[macro_export]
macro_rules! log_task_start {
    ($label:expr) => {
        tracing::info!(task = %$label, "Starting task")
    };
}

/// Log the completion of a task
///
/// # Example
///
/// ```no_run
/// use ferry::log_task_complete;
/// use std::time::Duration;
///
/// log_task_complete!("export orders", 120, 0, Duration::from_secs(3));
/// ```
#[macro_export]
macro_rules! log_task_complete {
    ($label:expr, $written:expr, $failed:expr, $duration:expr) => {
        tracing::info!(
            task = %$label,
            written = $written,
            failed = $failed,
            duration_ms = $duration.as_millis() as u64,
            "Task completed"
        )
    };
}

/// Log a batch handed to the writer
///
/// # Example
///
/// ```no_run
/// use ferry::log_batch_processing;
///
/// log_batch_processing!("users", 3, 100);
/// ```
#[macro_export]
macro_rules! log_batch_processing {
    ($table:expr, $index:expr, $size:expr) => {
        tracing::debug!(
            table = %$table,
            batch = $index,
            size = $size,
            "Processing batch"
        )
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use ferry::log_retry_attempt;
///
/// log_retry_attempt!(2, 5, "3 unprocessed items");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying operation"
        )
    };
}
