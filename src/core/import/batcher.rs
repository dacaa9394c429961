//! Batch assembly
//!
//! Groups records into batches of exactly `max_batch_size`, except the last
//! which holds the remainder. Order is preserved; an empty input yields no
//! batches.

use crate::domain::{Batch, FerryError, Record, Result};

fn check_size(max_batch_size: usize) -> Result<()> {
    if max_batch_size == 0 {
        return Err(FerryError::Configuration(
            "max batch size must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Push-based batch buffer
#[derive(Debug)]
pub struct Batcher {
    max_batch_size: usize,
    buffer: Vec<Record>,
}

impl Batcher {
    /// Create a batcher
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `max_batch_size` is zero.
    pub fn new(max_batch_size: usize) -> Result<Self> {
        check_size(max_batch_size)?;
        Ok(Self {
            max_batch_size,
            buffer: Vec::with_capacity(max_batch_size),
        })
    }

    /// Add a record; returns a full batch when one is ready
    pub fn push(&mut self, record: Record) -> Option<Batch> {
        self.buffer.push(record);
        if self.buffer.len() >= self.max_batch_size {
            self.flush()
        } else {
            None
        }
    }

    /// Records waiting in the buffer
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Emit the final partial batch, if any
    pub fn finish(mut self) -> Option<Batch> {
        self.flush()
    }

    fn flush(&mut self) -> Option<Batch> {
        let records = std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(self.max_batch_size),
        );
        Batch::try_new(records, self.max_batch_size).ok()
    }
}

/// Iterator adapter yielding batches from a record iterator
pub struct Batches<I> {
    records: I,
    batcher: Option<Batcher>,
}

impl<I: Iterator<Item = Record>> Batches<I> {
    /// Wrap `records`
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `max_batch_size` is zero.
    pub fn new(records: I, max_batch_size: usize) -> Result<Self> {
        Ok(Self {
            records,
            batcher: Some(Batcher::new(max_batch_size)?),
        })
    }
}

impl<I: Iterator<Item = Record>> Iterator for Batches<I> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let batcher = self.batcher.as_mut()?;
        for record in self.records.by_ref() {
            if let Some(batch) = batcher.push(record) {
                return Some(batch);
            }
        }
        self.batcher.take().and_then(Batcher::finish)
    }
}
