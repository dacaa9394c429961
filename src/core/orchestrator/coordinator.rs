//! Task coordinator - drives every work item to completion
//!
//! Imports run Source → Batcher → Writer, exports run Scanner → Exporter.
//! A fatal error in one task is recorded in its [`TaskResult`] and never
//! stops the others.

use crate::adapters::blob::{create_blob_store, SharedBlobStore};
use crate::adapters::store::{create_store, SharedStore, TableDescription};
use crate::config::{FerryConfig, ParseErrorPolicy, SourceFormat};
use crate::core::cancel::CancelToken;
use crate::core::export::{BlobExporter, StoreScanner};
use crate::core::import::{Batches, RecordSource, StoreWriter};
use crate::core::orchestrator::summary::RunSummary;
use crate::core::retry::RetryPolicy;
use crate::domain::{
    BlobKey, FailureReason, FerryError, ItemFailure, ParseError, Record, Result, TableName,
    TaskResult, WorkItem,
};
use crate::{log_task_complete, log_task_start};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Run coordinator
pub struct Coordinator {
    config: FerryConfig,
    store: SharedStore,
    blobs: SharedBlobStore,
    shutdown: watch::Receiver<bool>,
    policy: RetryPolicy,
    started_at: DateTime<Utc>,
}

impl Coordinator {
    /// Create a coordinator over existing backends
    pub fn new(
        config: FerryConfig,
        store: SharedStore,
        blobs: SharedBlobStore,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let policy = RetryPolicy::from_config(&config.retry);
        Self {
            config,
            store,
            blobs,
            shutdown,
            policy,
            started_at: Utc::now(),
        }
    }

    /// Build the backends named in the configuration
    ///
    /// # Errors
    ///
    /// Returns an error when a backend cannot be constructed.
    pub fn from_config(config: FerryConfig, shutdown: watch::Receiver<bool>) -> Result<Self> {
        let store = create_store(&config.store)?;
        let blobs = create_blob_store(&config.blob)?;
        Ok(Self::new(config, store, blobs, shutdown))
    }

    /// Override the run start time used in export blob keys
    pub fn with_run_started(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    /// Override the retry policy
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The store handle
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Configured work items: exports first, then imports
    pub fn work_items(&self) -> Result<Vec<WorkItem>> {
        self.config.work_items().map_err(FerryError::Configuration)
    }

    /// Run every work item and summarize
    ///
    /// At most `run.concurrency` tasks run at once; results come back in
    /// the order of `items`.
    pub async fn run(&self, items: Vec<WorkItem>) -> RunSummary {
        let clock = Instant::now();
        let concurrency = self.config.run.concurrency.max(1);

        tracing::info!(
            tasks = items.len(),
            concurrency,
            store = self.store.backend_name(),
            blob = self.blobs.backend_name(),
            dry_run = self.dry_run(),
            "Starting run"
        );

        let mut results: Vec<(usize, TaskResult)> = stream::iter(items.into_iter().enumerate())
            .map(|(index, item)| async move { (index, self.run_item(item).await) })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);

        let summary = RunSummary::new(
            self.config.run.mode,
            self.started_at,
            clock.elapsed(),
            self.dry_run(),
            results.into_iter().map(|(_, result)| result).collect(),
        );
        summary.log_summary();
        summary
    }

    fn dry_run(&self) -> bool {
        self.config.application.dry_run
    }

    fn cancel_token(&self) -> CancelToken {
        let token = CancelToken::from_shutdown(self.shutdown.clone());
        match self.config.run.task_timeout_secs {
            Some(secs) => token.with_timeout(Duration::from_secs(secs)),
            None => token,
        }
    }

    /// Run one work item
    pub async fn run_item(&self, item: WorkItem) -> TaskResult {
        if *self.shutdown.borrow() {
            tracing::warn!(task = %item, "Shutdown requested; task not started");
            let err = FerryError::Cancelled("shutdown requested before the task started".to_string());
            return TaskResult::failed(item, &err);
        }

        let label = item.label();
        log_task_start!(label);
        let clock = Instant::now();
        let cancel = self.cancel_token();

        let result = match &item {
            WorkItem::Import { table, blob } => {
                let (table, blob) = (table.clone(), blob.clone());
                self.run_import(item, &table, &blob, &cancel).await
            }
            WorkItem::Export { table } => {
                let table = table.clone();
                self.run_export(item, &table, &cancel).await
            }
        };
        let result = result.with_duration(clock.elapsed());

        match &result.error {
            Some(error) => tracing::error!(
                task = %label,
                kind = %error.kind,
                error = %error.message,
                "Task failed"
            ),
            None => log_task_complete!(
                label,
                result.records_written,
                result.failures.len(),
                clock.elapsed()
            ),
        }
        result
    }

    async fn describe(&self, table: &TableName, cancel: &CancelToken) -> Result<TableDescription> {
        self.policy
            .run(&format!("describe {table}"), cancel, || {
                self.store.describe_table(table)
            })
            .await
    }

    async fn run_import(
        &self,
        item: WorkItem,
        table: &TableName,
        blob: &BlobKey,
        cancel: &CancelToken,
    ) -> TaskResult {
        let description = match self.describe(table, cancel).await {
            Ok(description) => description,
            Err(e) => return TaskResult::failed(item, &e),
        };

        let import = &self.config.import;
        let body = match cancel
            .run(self.blobs.get(&import.source_container, blob))
            .await
            .and_then(|body| body)
        {
            Ok(body) => body,
            Err(e) => return TaskResult::failed(item, &e),
        };

        let format = import.format.unwrap_or_else(|| SourceFormat::infer(blob));
        let delimiter = match import.delimiter_byte() {
            Ok(delimiter) => delimiter,
            Err(e) => return TaskResult::failed(item, &FerryError::Configuration(e)),
        };
        let source = match RecordSource::open(body, format, delimiter) {
            Ok(source) => source,
            Err(e) => return TaskResult::failed(item, &FerryError::from(e)),
        };

        tracing::debug!(table = %table, blob = %blob, ?format, "Opened import source");

        let writer = StoreWriter::new(self.store.clone(), description, self.policy, cancel.clone())
            .dry_run(self.dry_run());

        match import.parse_error_policy {
            ParseErrorPolicy::Abort => {
                let mut parse_error: Option<ParseError> = None;
                let records = source.map_while(|row| match row {
                    Ok(record) => Some(record),
                    Err(e) => {
                        parse_error = Some(e);
                        None
                    }
                });
                let mut result = match Batches::new(records, import.max_batch_size) {
                    Ok(batches) => writer.write_all(item, batches).await,
                    Err(e) => return TaskResult::failed(item, &e),
                };

                if let Some(e) = parse_error {
                    tracing::error!(table = %table, row = e.row, error = %e.message, "Malformed row; import stopped");
                    result.add_failure(ItemFailure::new(FailureReason::Parse, e.message.clone()).with_row(e.row));
                    if result.error.is_none() {
                        result.fail(&FerryError::from(e));
                    }
                }
                result
            }
            ParseErrorPolicy::Skip => {
                let mut skipped: Vec<ItemFailure> = Vec::new();
                let records = source.filter_map(|row| match row {
                    Ok(record) => Some(record),
                    Err(e) => {
                        tracing::warn!(table = %table, row = e.row, error = %e.message, "Skipping malformed row");
                        skipped.push(ItemFailure::new(FailureReason::Parse, e.message).with_row(e.row));
                        None
                    }
                });
                let mut result = match Batches::new(records, import.max_batch_size) {
                    Ok(batches) => writer.write_all(item, batches).await,
                    Err(e) => return TaskResult::failed(item, &e),
                };

                for failure in skipped {
                    result.add_failure(failure);
                }
                result
            }
        }
    }

    async fn run_export(&self, item: WorkItem, table: &TableName, cancel: &CancelToken) -> TaskResult {
        let description = match self.describe(table, cancel).await {
            Ok(description) => description,
            Err(e) => return TaskResult::failed(item, &e),
        };

        let scanner = StoreScanner::new(
            self.store.clone(),
            self.policy,
            cancel.clone(),
            self.config.store.scan_page_size,
        );
        let snapshot = match scanner.scan(table).await {
            Ok(snapshot) => snapshot,
            Err(e) => return TaskResult::failed(item, &e),
        };

        let export = &self.config.export;
        let exporter = BlobExporter::new(
            self.blobs.clone(),
            export.destination_container.clone(),
            export.format,
            export.key_prefix.clone(),
            self.config.store.region.clone(),
            self.started_at,
        )
        .dry_run(self.dry_run());

        let mut result = TaskResult::new(item);
        match cancel.run(exporter.export(&snapshot)).await.and_then(|r| r) {
            Ok(receipt) => {
                result.records_observed = snapshot.len();
                result.records_written = receipt.items;
                result.blob_key = Some(receipt.blob_key.to_string());
            }
            Err(e) => {
                let reason = match &e {
                    FerryError::Cancelled(_) => FailureReason::Cancelled,
                    _ => FailureReason::Aborted,
                };
                for record in &snapshot.items {
                    result.add_failure(unexported(&description, record, reason, &e));
                }
                result.fail(&e);
            }
        }
        result
    }
}

fn unexported(
    description: &TableDescription,
    record: &Record,
    reason: FailureReason,
    error: &FerryError,
) -> ItemFailure {
    ItemFailure::new(reason, error.to_string()).with_key(description.item_key(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::blob::MemoryBlobStore;
    use crate::adapters::store::{KeyValueStore, MemoryStore};
    use crate::config::{
        ApplicationConfig, BlobBackend, BlobConfig, ExportConfig, ExportFormat, ImportConfig,
        ImportTaskConfig, LoggingConfig, RetryConfig, RunConfig, RunMode, StoreBackend,
        StoreConfig,
    };
    use crate::domain::{ErrorKind, TaskStatus};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn config() -> FerryConfig {
        FerryConfig {
            application: ApplicationConfig::default(),
            store: StoreConfig {
                backend: StoreBackend::Memory,
                region: "local".to_string(),
                max_batch_write_items: 25,
                scan_page_size: 2,
                postgresql: None,
            },
            blob: BlobConfig {
                backend: BlobBackend::Memory,
                local: None,
                http: None,
            },
            import: ImportConfig {
                source_container: "incoming".to_string(),
                max_batch_size: 10,
                ..Default::default()
            },
            export: ExportConfig {
                destination_container: "exports".to_string(),
                ..Default::default()
            },
            retry: RetryConfig::default(),
            run: RunConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    async fn setup(config: FerryConfig) -> (Arc<MemoryStore>, Arc<MemoryBlobStore>, Coordinator) {
        let store = Arc::new(MemoryStore::new(25));
        store
            .create_table(&TableName::new("users").unwrap(), &["id".to_string()])
            .await
            .unwrap();
        let blobs = Arc::new(MemoryBlobStore::new());
        let (_tx, rx) = watch::channel(false);
        let coordinator = Coordinator::new(config, store.clone(), blobs.clone(), rx)
            .with_retry_policy(RetryPolicy::immediate(3))
            .with_run_started(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
        (store, blobs, coordinator)
    }

    fn import(table: &str, blob: &str) -> WorkItem {
        WorkItem::Import {
            table: TableName::new(table).unwrap(),
            blob: BlobKey::new(blob).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_import_csv() {
        let (store, blobs, coordinator) = setup(config()).await;
        blobs.insert("incoming", "users.csv", "id,name\n1,Ada\n2,Grace\n3,Linus\n").await;

        let result = coordinator.run_item(import("users", "users.csv")).await;
        assert_eq!(result.status(), TaskStatus::Succeeded);
        assert_eq!(result.records_written, 3);
        assert_eq!(store.item_count(&TableName::new("users").unwrap()).await, 3);
    }

    #[tokio::test]
    async fn test_abort_policy_writes_rows_before_bad_row() {
        let (store, blobs, coordinator) = setup(config()).await;
        blobs.insert("incoming", "users.csv", "id,name\n1,Ada\n2\n3,Linus\n").await;

        let result = coordinator.run_item(import("users", "users.csv")).await;
        assert_eq!(result.status(), TaskStatus::Failed);
        assert_eq!(result.error.as_ref().unwrap().kind, ErrorKind::Parse);
        assert_eq!(result.records_written, 1);
        assert_eq!(result.failures[0].row, Some(2));
        assert!(result.is_fully_accounted());
        assert_eq!(store.item_count(&TableName::new("users").unwrap()).await, 1);
    }

    #[tokio::test]
    async fn test_skip_policy_continues() {
        let mut config = config();
        config.import.parse_error_policy = ParseErrorPolicy::Skip;
        let (_store, blobs, coordinator) = setup(config).await;
        blobs.insert("incoming", "users.csv", "id,name\n1,Ada\n2\n3,Linus\n").await;

        let result = coordinator.run_item(import("users", "users.csv")).await;
        assert_eq!(result.status(), TaskStatus::CompletedWithFailures);
        assert_eq!(result.records_observed, 3);
        assert_eq!(result.records_written, 2);
        assert_eq!(result.failures_with_reason(FailureReason::Parse), 1);
    }

    #[tokio::test]
    async fn test_missing_blob_fails_task() {
        let (_store, _blobs, coordinator) = setup(config()).await;
        let result = coordinator.run_item(import("users", "absent.csv")).await;
        assert_eq!(result.error.unwrap().kind, ErrorKind::Access);
    }

    #[tokio::test]
    async fn test_export_writes_blob_key() {
        let mut config = config();
        config.export.format = ExportFormat::Csv;
        let (store, blobs, coordinator) = setup(config).await;
        let records: Vec<Record> = vec![[("id", serde_json::json!("1"))].into_iter().collect()];
        store.batch_write(&TableName::new("users").unwrap(), &records).await.unwrap();

        let result = coordinator
            .run_item(WorkItem::Export { table: TableName::new("users").unwrap() })
            .await;
        assert!(result.is_successful());
        assert_eq!(
            result.blob_key.as_deref(),
            Some("source-users-local-2024-01-02-03:04:05.csv")
        );
        assert_eq!(blobs.keys("exports").await.len(), 1);
    }

    #[tokio::test]
    async fn test_export_blob_failure_records_items() {
        let (store, blobs, coordinator) = setup(config()).await;
        let records: Vec<Record> = (0..3)
            .map(|i| [("id", serde_json::json!(i.to_string()))].into_iter().collect())
            .collect();
        store.batch_write(&TableName::new("users").unwrap(), &records).await.unwrap();
        blobs.reject_writes("exports").await;

        let result = coordinator
            .run_item(WorkItem::Export { table: TableName::new("users").unwrap() })
            .await;
        assert_eq!(result.error.as_ref().unwrap().kind, ErrorKind::BlobWrite);
        assert_eq!(result.failures_with_reason(FailureReason::Aborted), 3);
        assert!(result.failures.iter().all(|f| f.item_key.is_some()));
    }

    #[tokio::test]
    async fn test_run_preserves_configured_order() {
        let mut config = config();
        config.run.concurrency = 4;
        config.run.mode = RunMode::Strict;
        config.import.tasks = vec![ImportTaskConfig {
            table_name: "users".to_string(),
            blob_key: "users.csv".to_string(),
        }];
        config.export.tables = vec!["missing".to_string(), "users".to_string()];
        let (_store, blobs, coordinator) = setup(config).await;
        blobs.insert("incoming", "users.csv", "id\n1\n").await;

        let items = coordinator.work_items().unwrap();
        let summary = coordinator.run(items).await;

        let labels: Vec<String> = summary.tasks.iter().map(|t| t.work_item.label()).collect();
        assert_eq!(
            labels,
            vec!["export missing", "export users", "import users.csv -> users"]
        );
        assert_eq!(summary.tasks[0].status(), TaskStatus::Failed);
        assert!(summary.tasks[2].is_successful());
        assert!(!summary.is_successful());
    }

    #[tokio::test]
    async fn test_shutdown_before_start() {
        let store = Arc::new(MemoryStore::new(25));
        let blobs = Arc::new(MemoryBlobStore::new());
        let (tx, rx) = watch::channel(false);
        let coordinator = Coordinator::new(config(), store, blobs, rx);
        tx.send(true).unwrap();

        let result = coordinator.run_item(import("users", "users.csv")).await;
        assert_eq!(result.error.unwrap().kind, ErrorKind::Cancelled);
    }
}
