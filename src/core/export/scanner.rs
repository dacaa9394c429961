//! Store scanner
//!
//! Reads a whole table page by page into a [`Snapshot`].

use crate::adapters::store::SharedStore;
use crate::core::cancel::CancelToken;
use crate::core::retry::RetryPolicy;
use crate::domain::{FerryError, Result, Snapshot, TableName};

/// Paginated table reader
pub struct StoreScanner {
    store: SharedStore,
    policy: RetryPolicy,
    cancel: CancelToken,
    page_size: usize,
}

impl StoreScanner {
    /// Create a scanner reading `page_size` items per request
    pub fn new(
        store: SharedStore,
        policy: RetryPolicy,
        cancel: CancelToken,
        page_size: usize,
    ) -> Self {
        Self {
            store,
            policy,
            cancel,
            page_size: page_size.max(1),
        }
    }

    /// Scan `table` until the store reports no next page
    ///
    /// Throttled or unavailable pages are retried under the retry policy.
    ///
    /// # Errors
    ///
    /// Access errors, exhausted retries and cancellation end the scan.
    pub async fn scan(&self, table: &TableName) -> Result<Snapshot> {
        let mut items = Vec::new();
        let mut pages = 0;
        let mut start_key: Option<String> = None;

        loop {
            let what = format!("scan {table} page {}", pages + 1);
            let page = self
                .policy
                .run(&what, &self.cancel, || {
                    self.store
                        .scan_page(table, start_key.as_deref(), self.page_size)
                })
                .await?;

            pages += 1;
            tracing::debug!(
                table = %table,
                page = pages,
                items = page.items.len(),
                "Scanned page"
            );
            items.extend(page.items);

            match page.next_start_key {
                Some(next) if start_key.as_deref() == Some(next.as_str()) => {
                    return Err(FerryError::Other(format!(
                        "scan of {table} did not advance past key {next}"
                    )));
                }
                Some(next) => start_key = Some(next),
                None => break,
            }
        }

        tracing::info!(table = %table, items = items.len(), pages, "Table scanned");

        Ok(Snapshot {
            table: table.clone(),
            items,
            pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::store::{KeyValueStore, MemoryStore};
    use crate::domain::{ErrorKind, Record};
    use serde_json::json;
    use std::sync::Arc;

    fn table() -> TableName {
        TableName::new("orders").unwrap()
    }

    async fn seeded(count: usize) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new(25));
        store.create_table(&table(), &["id".to_string()]).await.unwrap();
        let records: Vec<Record> = (0..count)
            .map(|i| [("id", json!(format!("{i:03}")))].into_iter().collect())
            .collect();
        for chunk in records.chunks(25) {
            store.batch_write(&table(), chunk).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_scan_paginates() {
        let store = seeded(45).await;
        let scanner = StoreScanner::new(
            store.clone(),
            RetryPolicy::immediate(3),
            CancelToken::never(),
            20,
        );

        let snapshot = scanner.scan(&table()).await.unwrap();
        assert_eq!(snapshot.len(), 45);
        assert_eq!(snapshot.pages, 3);
        assert_eq!(snapshot.items[0].get("id"), Some(&json!("000")));
        assert_eq!(snapshot.items[44].get("id"), Some(&json!("044")));
    }

    #[tokio::test]
    async fn test_scan_empty_table() {
        let store = seeded(0).await;
        let scanner = StoreScanner::new(store, RetryPolicy::immediate(3), CancelToken::never(), 10);

        let snapshot = scanner.scan(&table()).await.unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.pages, 1);
    }

    #[tokio::test]
    async fn test_throttled_pages_are_retried() {
        let store = seeded(5).await;
        store.throttle_scans(2).await;
        let scanner = StoreScanner::new(
            store.clone(),
            RetryPolicy::immediate(3),
            CancelToken::never(),
            10,
        );

        let snapshot = scanner.scan(&table()).await.unwrap();
        assert_eq!(snapshot.len(), 5);
        assert_eq!(store.scan_calls().await, 3);
    }

    #[tokio::test]
    async fn test_missing_table_is_access_error() {
        let store = Arc::new(MemoryStore::new(25));
        let scanner = StoreScanner::new(store, RetryPolicy::immediate(3), CancelToken::never(), 10);

        let err = scanner.scan(&table()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Access);
    }
}
