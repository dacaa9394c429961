//! Run summary and reporting

use crate::config::RunMode;
use crate::domain::{TaskResult, TaskStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::time::Duration;

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every task succeeded
    Succeeded,
    /// Some tasks failed or had permanent failures
    Partial,
    /// Every task failed
    Failed,
}

impl RunOutcome {
    /// Judge a set of task results
    pub fn from_tasks(tasks: &[TaskResult]) -> Self {
        if tasks.iter().all(TaskResult::is_successful) {
            RunOutcome::Succeeded
        } else if tasks.iter().all(|t| t.status() == TaskStatus::Failed) {
            RunOutcome::Failed
        } else {
            RunOutcome::Partial
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunOutcome::Succeeded => "succeeded",
            RunOutcome::Partial => "partial",
            RunOutcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Summary of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// How the outcome is judged
    pub mode: RunMode,
    /// Overall outcome
    pub outcome: RunOutcome,
    /// Human-readable verdict
    pub message: String,
    /// Run start time (also used in export blob keys)
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Nothing was written
    pub dry_run: bool,
    /// One result per work item, in configured order
    pub tasks: Vec<TaskResult>,
}

impl RunSummary {
    /// Build a summary from task results
    pub fn new(
        mode: RunMode,
        started_at: DateTime<Utc>,
        duration: Duration,
        dry_run: bool,
        tasks: Vec<TaskResult>,
    ) -> Self {
        let outcome = RunOutcome::from_tasks(&tasks);
        let mut summary = Self {
            mode,
            outcome,
            message: String::new(),
            started_at,
            duration_ms: duration.as_millis() as u64,
            dry_run,
            tasks,
        };
        summary.message = summary.verdict();
        summary
    }

    /// Whether the run counts as successful under its mode
    pub fn is_successful(&self) -> bool {
        match self.mode {
            RunMode::BestEffort => self.outcome != RunOutcome::Failed,
            RunMode::Strict => self.outcome == RunOutcome::Succeeded,
        }
    }

    /// Records written across all tasks
    pub fn total_written(&self) -> usize {
        self.tasks.iter().map(|t| t.records_written).sum()
    }

    /// Permanent item failures across all tasks
    pub fn total_failed(&self) -> usize {
        self.tasks.iter().map(|t| t.failures.len()).sum()
    }

    /// Number of tasks with the given status
    pub fn tasks_with_status(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status() == status).count()
    }

    fn verdict(&self) -> String {
        if self.tasks.is_empty() {
            return "Nothing to do: no work items configured".to_string();
        }

        let failed_tasks = self.tasks_with_status(TaskStatus::Failed);
        match self.outcome {
            RunOutcome::Succeeded => format!(
                "All {} task(s) succeeded; {} record(s) transferred",
                self.tasks.len(),
                self.total_written()
            ),
            RunOutcome::Partial => format!(
                "{} of {} task(s) failed; {} record(s) transferred, {} permanently failed",
                failed_tasks,
                self.tasks.len(),
                self.total_written(),
                self.total_failed()
            ),
            RunOutcome::Failed => format!("All {} task(s) failed", self.tasks.len()),
        }
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            outcome = %self.outcome,
            mode = ?self.mode,
            tasks = self.tasks.len(),
            written = self.total_written(),
            failed = self.total_failed(),
            duration_ms = self.duration_ms,
            "Run completed"
        );

        for task in self.tasks.iter().filter(|t| t.error.is_some()) {
            if let Some(error) = &task.error {
                tracing::warn!(
                    task = %task.work_item,
                    kind = %error.kind,
                    message = %error.message,
                    "Task failed"
                );
            }
        }
    }

    /// Render the summary for the terminal
    ///
    /// Every task's status is listed, followed by every permanently failed
    /// item with its reason.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Run {}: {}", self.outcome, self.message);
        if self.dry_run {
            let _ = writeln!(out, "(dry run: nothing was written)");
        }
        let _ = writeln!(
            out,
            "Duration: {:.2}s",
            Duration::from_millis(self.duration_ms).as_secs_f64()
        );

        for task in &self.tasks {
            let _ = writeln!(
                out,
                "\n- {} [{}] observed={} written={} failed={} ({} ms)",
                task.work_item,
                task.status(),
                task.records_observed,
                task.records_written,
                task.failures.len(),
                task.duration_ms
            );
            if let Some(blob) = &task.blob_key {
                let _ = writeln!(out, "    blob: {blob}");
            }
            if let Some(error) = &task.error {
                let _ = writeln!(out, "    error ({}): {}", error.kind, error.message);
            }
            for failure in &task.failures {
                let key = failure.item_key.as_deref().unwrap_or("-");
                match failure.row {
                    Some(row) => {
                        let _ = writeln!(
                            out,
                            "    {} row={} key={}: {}",
                            failure.reason, row, key, failure.message
                        );
                    }
                    None => {
                        let _ = writeln!(out, "    {} key={}: {}", failure.reason, key, failure.message);
                    }
                }
            }
        }

        out
    }
}
