//! Batching Logic for the Stream Writer
//!
//! This module packs encoded records into provider-legal batches. A batch is the
//! unit of submission: one `put_records` call per batch per attempt.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  write(records)  │ StreamWriter API
//! └────────┬─────────┘
//!          │ encoded, in input order
//!          ▼
//! ┌──────────────────────────────┐
//! │  RecordBatcher               │ Single greedy pass
//! │  - max_batch_count: 500      │
//! │  - max_batch_bytes: 5 MiB    │
//! └────────┬─────────────────────┘
//!          │
//!          ├─→ Batch 0: records 0..500
//!          ├─→ Batch 1: records 500..1000
//!          └─→ Batch 2: records 1000..1200
//! ```
//!
//! ## Packing Rule
//!
//! Records are appended to the current batch until the next one would push it
//! over `max_batch_count` records or `max_batch_bytes` bytes; then the batch is
//! closed and a new one started. Records are never reordered, so concatenating
//! the batches gives back the input exactly, and records sharing a partition key
//! keep their relative order.
//!
//! A batch holding a single record close to the byte limit is expected, not an
//! error.

use statementlog_core::EncodedRecord;
use tracing::{debug, trace, warn};

/// Provider limit on records per `put_records` call.
pub const DEFAULT_MAX_BATCH_COUNT: usize = 500;

/// Provider limit on bytes per `put_records` call (5 MiB).
pub const DEFAULT_MAX_BATCH_BYTES: usize = 5 * 1024 * 1024;

/// An encoded record tagged with its position in the caller's input.
///
/// The index survives batching and retries so every outcome can be reported
/// against the record the caller passed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub index: usize,
    pub record: EncodedRecord,
}

impl BatchEntry {
    pub fn new(index: usize, record: EncodedRecord) -> Self {
        Self { index, record }
    }

    pub fn size_bytes(&self) -> usize {
        self.record.size_bytes()
    }
}

/// An ordered group of records submitted in one provider call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    entries: Vec<BatchEntry>,
    size_bytes: usize,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a batch from entries, keeping their order.
    pub fn from_entries(entries: Vec<BatchEntry>) -> Self {
        let size_bytes = entries.iter().map(BatchEntry::size_bytes).sum();
        Self {
            entries,
            size_bytes,
        }
    }

    pub fn append(&mut self, entry: BatchEntry) {
        self.size_bytes += entry.size_bytes();
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of key + payload bytes of all records.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<BatchEntry> {
        self.entries
    }
}

/// Greedy, order-preserving packer.
#[derive(Debug, Clone)]
pub struct RecordBatcher {
    max_batch_count: usize,
    max_batch_bytes: usize,
}

impl Default for RecordBatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH_COUNT, DEFAULT_MAX_BATCH_BYTES)
    }
}

impl RecordBatcher {
    /// Create a batcher.
    ///
    /// # Arguments
    ///
    /// * `max_batch_count` - Maximum records per batch (must be > 0)
    /// * `max_batch_bytes` - Maximum key + payload bytes per batch (must be > 0)
    pub fn new(max_batch_count: usize, max_batch_bytes: usize) -> Self {
        Self {
            max_batch_count: max_batch_count.max(1),
            max_batch_bytes: max_batch_bytes.max(1),
        }
    }

    pub fn max_batch_count(&self) -> usize {
        self.max_batch_count
    }

    pub fn max_batch_bytes(&self) -> usize {
        self.max_batch_bytes
    }

    /// Check whether `entry` can join `batch` without breaking either limit.
    pub fn fits(&self, batch: &Batch, entry: &BatchEntry) -> bool {
        batch.len() < self.max_batch_count
            && batch.size_bytes() + entry.size_bytes() <= self.max_batch_bytes
    }

    /// Split entries into batches, preserving order.
    ///
    /// # Returns
    ///
    /// Non-empty batches, each within both limits, whose concatenation equals
    /// the input. Empty input gives no batches.
    ///
    /// An entry that alone exceeds `max_batch_bytes` cannot be split; it is
    /// placed in a batch of its own. The writer rules this out by requiring the
    /// per-record limit to be at most the batch byte limit.
    pub fn batch<I>(&self, entries: I) -> Vec<Batch>
    where
        I: IntoIterator<Item = BatchEntry>,
    {
        let mut batches = Vec::new();
        let mut current = Batch::new();

        for entry in entries {
            if !current.is_empty() && !self.fits(&current, &entry) {
                trace!(
                    record_count = current.len(),
                    size_bytes = current.size_bytes(),
                    "Closing batch"
                );
                batches.push(std::mem::take(&mut current));
            }

            if entry.size_bytes() > self.max_batch_bytes {
                warn!(
                    index = entry.index,
                    size_bytes = entry.size_bytes(),
                    max_batch_bytes = self.max_batch_bytes,
                    "Record exceeds batch byte limit on its own"
                );
            }
            current.append(entry);
        }

        if !current.is_empty() {
            batches.push(current);
        }

        debug!(batch_count = batches.len(), "Packed records into batches");
        batches
    }
}
