//! Integration tests for graceful shutdown and task deadlines
//!
//! These tests verify that:
//! - Shutdown signals propagate to every receiver
//! - A shutdown during retry backoff abandons the pending items as cancelled
//! - Tasks that have not started when shutdown arrives fail as cancelled
//! - A task deadline stops the task without affecting others

use ferry::adapters::blob::MemoryBlobStore;
use ferry::adapters::store::{KeyValueStore, MemoryStore, ThrottleMode};
use ferry::config::{load_config_from_str, FerryConfig};
use ferry::core::cancel::CancelToken;
use ferry::core::orchestrator::{Coordinator, RunOutcome};
use ferry::domain::{ErrorKind, FailureReason, TableName, TaskStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const CONFIG: &str = r#"
[store]
backend = "memory"
region = "local"

[blob]
backend = "memory"

[import]
source_container = "incoming"
max_batch_size = 20

[[import.tasks]]
table_name = "busy_table"
blob_key = "busy.csv"

[[import.tasks]]
table_name = "idle_table"
blob_key = "idle.csv"

[retry]
max_attempts = 10
base_delay_ms = 1000
max_delay_ms = 60000

[run]
concurrency = 1
"#;

fn table(name: &str) -> TableName {
    TableName::new(name).unwrap()
}

fn rows(count: usize) -> String {
    std::iter::once("id,value\n".to_string())
        .chain((0..count).map(|i| format!("{i},v{i}\n")))
        .collect()
}

async fn setup(
    config: FerryConfig,
) -> (Arc<MemoryStore>, watch::Sender<bool>, Coordinator) {
    let store = Arc::new(MemoryStore::new(25));
    for name in ["busy_table", "idle_table"] {
        store.create_table(&table(name), &["id".to_string()]).await.unwrap();
    }
    store.set_throttle(ThrottleMode::Always).await;
    store.throttle_only(&table("busy_table")).await;

    let blobs = Arc::new(MemoryBlobStore::new());
    blobs.insert("incoming", "busy.csv", rows(50)).await;
    blobs.insert("incoming", "idle.csv", rows(5)).await;

    let (tx, rx) = watch::channel(false);
    let coordinator = Coordinator::new(config, store.clone(), blobs, rx);
    (store, tx, coordinator)
}

#[tokio::test]
async fn test_shutdown_signal_propagation() {
    let (shutdown_tx, shutdown_rx1) = watch::channel(false);
    let shutdown_rx2 = shutdown_rx1.clone();

    assert!(!*shutdown_rx1.borrow());
    assert!(!*shutdown_rx2.borrow());

    shutdown_tx.send(true).unwrap();

    assert!(*shutdown_rx1.borrow());
    assert!(*shutdown_rx2.borrow());
}

#[tokio::test]
async fn test_cancel_token_follows_shutdown() {
    let (tx, rx) = watch::channel(false);
    let token = CancelToken::from_shutdown(rx);
    assert!(!token.is_cancelled());

    tx.send(true).unwrap();
    assert!(token.is_cancelled());
    assert!(token.error().to_string().contains("shutdown"));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_backoff_cancels_pending_items() {
    let (store, tx, coordinator) = setup(load_config_from_str(CONFIG).unwrap()).await;
    let items = coordinator.work_items().unwrap();

    let signal = async {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        tx.send(true).unwrap();
    };
    let (summary, ()) = tokio::join!(coordinator.run(items), signal);

    let busy = &summary.tasks[0];
    assert_eq!(busy.status(), TaskStatus::Failed);
    assert_eq!(busy.error.as_ref().unwrap().kind, ErrorKind::Cancelled);
    assert_eq!(busy.records_observed, 50);
    assert_eq!(busy.records_written, 0);
    assert_eq!(busy.failures_with_reason(FailureReason::Cancelled), 50);
    assert!(busy.is_fully_accounted());

    let idle = &summary.tasks[1];
    assert_eq!(idle.status(), TaskStatus::Failed);
    assert_eq!(idle.error.as_ref().unwrap().kind, ErrorKind::Cancelled);
    assert_eq!(store.item_count(&table("idle_table")).await, 0);

    assert_eq!(summary.outcome, RunOutcome::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_task_deadline_stops_only_that_task() {
    let mut config = load_config_from_str(CONFIG).unwrap();
    config.run.task_timeout_secs = Some(2);
    let (store, _tx, coordinator) = setup(config).await;

    let summary = coordinator.run(coordinator.work_items().unwrap()).await;

    let busy = &summary.tasks[0];
    assert_eq!(busy.error.as_ref().unwrap().kind, ErrorKind::Cancelled);
    assert!(busy.error.as_ref().unwrap().message.contains("deadline"));
    assert_eq!(busy.failures_with_reason(FailureReason::Cancelled), 50);

    let idle = &summary.tasks[1];
    assert!(idle.is_successful());
    assert_eq!(store.item_count(&table("idle_table")).await, 5);
    assert_eq!(summary.outcome, RunOutcome::Partial);
}

#[tokio::test]
async fn test_shutdown_before_run_starts_nothing() {
    let (store, tx, coordinator) = setup(load_config_from_str(CONFIG).unwrap()).await;
    tx.send(true).unwrap();

    let summary = coordinator.run(coordinator.work_items().unwrap()).await;

    assert!(summary
        .tasks
        .iter()
        .all(|t| t.error.as_ref().map(|e| e.kind) == Some(ErrorKind::Cancelled)));
    assert_eq!(store.write_calls().await, 0);
}
