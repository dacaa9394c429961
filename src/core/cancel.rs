//! Cooperative task cancellation
//!
//! A [`CancelToken`] fires when the process-wide shutdown signal is raised or
//! when the task's own deadline passes, whichever happens first.

use crate::domain::FerryError;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Why a token fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// SIGINT/SIGTERM received
    Shutdown,
    /// The task deadline passed
    DeadlineExceeded,
}

impl CancelReason {
    /// Human-readable description
    pub fn describe(&self) -> &'static str {
        match self {
            CancelReason::Shutdown => "shutdown requested",
            CancelReason::DeadlineExceeded => "task deadline exceeded",
        }
    }
}

/// Cancellation handle shared by the components of one task
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    shutdown: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that never fires
    pub fn never() -> Self {
        Self::default()
    }

    /// A token that fires when `shutdown` turns true
    pub fn from_shutdown(shutdown: watch::Receiver<bool>) -> Self {
        Self {
            shutdown: Some(shutdown),
            deadline: None,
        }
    }

    /// Add a deadline `timeout` from now
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Why the token has fired, if it has
    pub fn reason(&self) -> Option<CancelReason> {
        if self.shutdown.as_ref().is_some_and(|rx| *rx.borrow()) {
            return Some(CancelReason::Shutdown);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(CancelReason::DeadlineExceeded);
        }
        None
    }

    /// Whether the token has fired
    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// The error recorded for work abandoned because of this token
    pub fn error(&self) -> FerryError {
        let reason = self.reason().unwrap_or(CancelReason::Shutdown);
        FerryError::Cancelled(reason.describe().to_string())
    }

    /// Completes once the token fires
    pub async fn cancelled(&self) {
        let shutdown = async {
            match self.shutdown.clone() {
                Some(mut rx) => loop {
                    if *rx.borrow_and_update() {
                        return;
                    }
                    if rx.changed().await.is_err() {
                        // Sender gone: shutdown can no longer be signalled
                        std::future::pending::<()>().await;
                    }
                },
                None => std::future::pending::<()>().await,
            }
        };

        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = shutdown => {}
            _ = deadline => {}
        }
    }

    /// Run `future` unless the token fires first
    ///
    /// # Errors
    ///
    /// Returns [`FerryError::Cancelled`] when the token fired; `future` is
    /// dropped at that point.
    pub async fn run<F: Future>(&self, future: F) -> Result<F::Output, FerryError> {
        if self.is_cancelled() {
            return Err(self.error());
        }

        tokio::select! {
            biased;
            _ = self.cancelled() => Err(self.error()),
            output = future => Ok(output),
        }
    }
}
