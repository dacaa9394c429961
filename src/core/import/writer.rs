//! Store writer
//!
//! Submits batches to the key-value store in chunks no larger than the
//! store's grouped-write cap. Items the store leaves unprocessed, or whole
//! requests it rejects for capacity, are resubmitted with exponential
//! backoff until the retry budget runs out.

use crate::adapters::store::{SharedStore, TableDescription};
use crate::core::cancel::CancelToken;
use crate::core::retry::RetryPolicy;
use crate::domain::{
    Batch, ErrorKind, FailureReason, FerryError, ItemFailure, Record, StoreError, TaskResult,
    WorkItem, WriteOutcome,
};
use crate::{log_batch_processing, log_retry_attempt};
use std::collections::{HashSet, VecDeque};
use std::fmt;

type Keyed = (String, Record);

/// A fatal error interrupted a batch
///
/// `outcome` accounts for every record of the batch: what was written
/// before the error and what was abandoned.
#[derive(Debug)]
pub struct WriteAborted {
    /// Partial outcome of the batch
    pub outcome: WriteOutcome,
    /// The error that ended the task
    pub error: FerryError,
}

impl fmt::Display for WriteAborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "write aborted after {} items: {}",
            self.outcome.written.len(),
            self.error
        )
    }
}

/// Writes batches of one table
pub struct StoreWriter {
    store: SharedStore,
    table: TableDescription,
    policy: RetryPolicy,
    cancel: CancelToken,
    chunk_size: usize,
    dry_run: bool,
}

impl StoreWriter {
    /// Create a writer for `table`
    pub fn new(
        store: SharedStore,
        table: TableDescription,
        policy: RetryPolicy,
        cancel: CancelToken,
    ) -> Self {
        let chunk_size = store.max_batch_write_items().max(1);
        Self {
            store,
            table,
            policy,
            cancel,
            chunk_size,
            dry_run: false,
        }
    }

    /// Skip submissions; every valid item counts as written
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Table being written
    pub fn table(&self) -> &TableDescription {
        &self.table
    }

    /// Write one batch
    ///
    /// Throttling, unavailability and cancellation end up as per-item
    /// failures in the returned outcome.
    ///
    /// # Errors
    ///
    /// An access error aborts the batch; [`WriteAborted`] carries the
    /// partial outcome with every unwritten item marked `aborted`.
    pub async fn write(&self, batch: Batch) -> Result<WriteOutcome, WriteAborted> {
        let mut outcome = WriteOutcome::default();
        let mut valid: Vec<Keyed> = Vec::with_capacity(batch.len());

        for record in batch.into_records() {
            match self.table.item_key(&record) {
                Some(key) => valid.push((key, record)),
                None => outcome.failures.push(ItemFailure::new(
                    FailureReason::InvalidItem,
                    format!(
                        "missing or empty key attribute(s) {:?}",
                        self.table.key_attributes
                    ),
                )),
            }
        }

        if self.dry_run {
            outcome.written.extend(valid.into_iter().map(|(key, _)| key));
            return Ok(outcome);
        }

        let mut chunks: VecDeque<Vec<Keyed>> = VecDeque::new();
        let mut iter = valid.into_iter().peekable();
        while iter.peek().is_some() {
            chunks.push_back(iter.by_ref().take(self.chunk_size).collect());
        }

        while let Some(chunk) = chunks.pop_front() {
            if let Err(error) = self.write_chunk(chunk, &mut outcome).await {
                let abandoned = chunks.drain(..).flatten();
                if error.kind() == ErrorKind::Cancelled {
                    outcome.cancelled = true;
                    fail_all(&mut outcome, abandoned, FailureReason::Cancelled, &error);
                    return Ok(outcome);
                }
                fail_all(&mut outcome, abandoned, FailureReason::Aborted, &error);
                return Err(WriteAborted { outcome, error });
            }
        }

        Ok(outcome)
    }

    /// Submit one chunk until it is fully written or its retries run out
    ///
    /// Returns an error only for cancellation or a fatal store error; the
    /// chunk's unwritten items are already recorded in `outcome` then.
    async fn write_chunk(
        &self,
        chunk: Vec<Keyed>,
        outcome: &mut WriteOutcome,
    ) -> Result<(), FerryError> {
        let mut pending = chunk;
        let mut attempt = 0;

        loop {
            attempt += 1;
            outcome.attempts += 1;

            let items: Vec<Record> = pending.iter().map(|(_, record)| record.clone()).collect();
            let response = match self
                .cancel
                .run(self.store.batch_write(&self.table.name, &items))
                .await
            {
                Ok(response) => response,
                Err(cancelled) => {
                    fail_all(outcome, pending, FailureReason::Cancelled, &cancelled);
                    return Err(cancelled);
                }
            };

            let (reason, detail) = match response {
                Ok(response) => {
                    let unprocessed: HashSet<String> = response
                        .unprocessed
                        .iter()
                        .filter_map(|record| self.table.item_key(record))
                        .collect();

                    let (remaining, written): (Vec<Keyed>, Vec<Keyed>) = pending
                        .into_iter()
                        .partition(|(key, _)| unprocessed.contains(key));
                    outcome.written.extend(written.into_iter().map(|(key, _)| key));
                    pending = remaining;

                    if pending.is_empty() {
                        return Ok(());
                    }
                    (
                        FailureReason::Throttled,
                        format!("{} items unprocessed", pending.len()),
                    )
                }
                Err(e) if e.is_retryable() => {
                    let reason = match &e {
                        FerryError::Store(StoreError::Throttled(_)) => FailureReason::Throttled,
                        _ => FailureReason::Unavailable,
                    };
                    (reason, e.to_string())
                }
                Err(e) if e.kind() == ErrorKind::Access => {
                    fail_all(outcome, pending, FailureReason::Aborted, &e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        table = %self.table.name,
                        items = pending.len(),
                        error = %e,
                        "Grouped write rejected"
                    );
                    fail_all(outcome, pending, FailureReason::Rejected, &e);
                    return Ok(());
                }
            };

            if attempt >= self.policy.max_attempts {
                tracing::warn!(
                    table = %self.table.name,
                    items = pending.len(),
                    attempts = attempt,
                    reason = %reason,
                    "Giving up on items after retries"
                );
                let message = format!("gave up after {attempt} attempts: {detail}");
                for (key, _) in pending {
                    outcome
                        .failures
                        .push(ItemFailure::new(reason, message.clone()).with_key(Some(key)));
                }
                return Ok(());
            }

            log_retry_attempt!(attempt, self.policy.max_attempts, detail);
            if let Err(cancelled) = self.policy.backoff(attempt, &self.cancel).await {
                fail_all(outcome, pending, FailureReason::Cancelled, &cancelled);
                return Err(cancelled);
            }
        }
    }

    /// Write every batch of a source, in order
    ///
    /// Batches are drained even after a fatal error or cancellation so that
    /// every observed record is accounted for.
    pub async fn write_all<I>(&self, work_item: WorkItem, batches: I) -> TaskResult
    where
        I: IntoIterator<Item = Batch>,
    {
        let mut result = TaskResult::new(work_item);
        let mut batches = batches.into_iter();
        let mut index = 0;

        while let Some(batch) = batches.next() {
            index += 1;

            if self.cancel.is_cancelled() {
                let error = self.cancel.error();
                let mut outcome = WriteOutcome {
                    cancelled: true,
                    ..Default::default()
                };
                let rest = std::iter::once(batch).chain(batches.by_ref());
                abandon(&mut outcome, &self.table, rest, FailureReason::Cancelled, &error);
                result.absorb(outcome);
                result.fail(&error);
                break;
            }

            log_batch_processing!(self.table.name, index, batch.len());

            match self.write(batch).await {
                Ok(outcome) => {
                    let cancelled = outcome.cancelled;
                    result.absorb(outcome);
                    if cancelled {
                        let error = self.cancel.error();
                        let mut rest = WriteOutcome::default();
                        abandon(
                            &mut rest,
                            &self.table,
                            batches.by_ref(),
                            FailureReason::Cancelled,
                            &error,
                        );
                        result.absorb(rest);
                        result.fail(&error);
                        break;
                    }
                }
                Err(WriteAborted { outcome, error }) => {
                    tracing::error!(
                        table = %self.table.name,
                        batch = index,
                        error = %error,
                        "Write aborted"
                    );
                    result.absorb(outcome);
                    let mut rest = WriteOutcome::default();
                    abandon(
                        &mut rest,
                        &self.table,
                        batches.by_ref(),
                        FailureReason::Aborted,
                        &error,
                    );
                    result.absorb(rest);
                    result.fail(&error);
                    break;
                }
            }
        }

        result
    }
}

/// Fail every record of batches that were never submitted
fn abandon(
    outcome: &mut WriteOutcome,
    table: &TableDescription,
    batches: impl Iterator<Item = Batch>,
    reason: FailureReason,
    error: &FerryError,
) {
    let message = error.to_string();
    for record in batches.flat_map(Batch::into_records) {
        outcome
            .failures
            .push(ItemFailure::new(reason, message.clone()).with_key(table.item_key(&record)));
    }
}

fn fail_all(
    outcome: &mut WriteOutcome,
    items: impl IntoIterator<Item = Keyed>,
    reason: FailureReason,
    error: &FerryError,
) {
    let message = error.to_string();
    for (key, _) in items {
        outcome
            .failures
            .push(ItemFailure::new(reason, message.clone()).with_key(Some(key)));
    }
}
