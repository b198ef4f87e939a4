//! Stream Writer
//!
//! The [`StreamWriter`] is the public entry point: it takes a slice of
//! records, and returns once every record has a final outcome.
//!
//! ## Architecture
//!
//! ```text
//! write(records)
//!   │
//!   ├─→ RecordEncoder     records → EncodedRecord, oversized → TooLarge
//!   ├─→ StreamProvisioner ensure the stream is Active (once per writer)
//!   ├─→ RecordBatcher     pack under count/byte limits, input order kept
//!   └─→ RetryCoordinator  one task per batch, at most `concurrency_limit`
//!         │               in flight
//!         ▼
//!     WriteResult         one entry per input record, sorted by index
//! ```
//!
//! ## Guarantees
//!
//! - Every input record appears exactly once in the result
//! - Per-record problems never fail the call; only configuration and an
//!   unreachable stream do (`Err(ClientError)`)
//! - No record is sent before the stream is `Active`
//! - Batches are independent: one batch backing off does not stall the others
//!
//! ## Usage
//!
//! ```ignore
//! use statementlog_client::{MemoryStreamProvider, StreamWriter};
//! use std::sync::Arc;
//!
//! let writer = StreamWriter::builder()
//!     .provider(Arc::new(MemoryStreamProvider::new()))
//!     .stream_name("statements")
//!     .build()?;
//!
//! let result = writer.write(&statements).await?;
//! println!("{} delivered, {} failed", result.succeeded(), result.failed());
//! ```

use crate::batch::{BatchEntry, RecordBatcher};
use crate::cancel::CancelHandle;
use crate::config::WriterConfig;
use crate::error::{ClientError, Result};
use crate::provider::StreamProvider;
use crate::provisioner::StreamProvisioner;
use crate::result::{FailureReason, RecordFailure, WriteResult};
use crate::retry::RetryCoordinator;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use statementlog_core::{Error as EncodeError, PartitionKeyStrategy, RecordEncoder};
use statementlog_observability::metrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Writes records to one stream, reliably and in batches.
///
/// A writer is `Send + Sync`; share it with `Arc<StreamWriter>` to write from
/// several tasks. Provisioning happens at most once across all of them.
pub struct StreamWriter {
    config: WriterConfig,
    encoder: RecordEncoder,
    batcher: RecordBatcher,
    provisioner: StreamProvisioner,
    coordinator: RetryCoordinator,
}

impl StreamWriter {
    pub fn builder() -> StreamWriterBuilder {
        StreamWriterBuilder::new()
    }

    /// Create a writer from an already assembled config.
    pub fn new(provider: Arc<dyn StreamProvider>, config: WriterConfig) -> Result<Self> {
        config.validate()?;
        metrics::init();

        let encoder = RecordEncoder::new(config.partition_key.clone(), config.max_record_bytes);
        let batcher = RecordBatcher::new(config.max_batch_count, config.max_batch_bytes);
        let provisioner = StreamProvisioner::new(
            Arc::clone(&provider),
            config.stream_name.clone(),
            config.shard_count,
        )
        .with_poll_interval(config.poll_interval)
        .with_timeout(config.provision_timeout);
        let coordinator =
            RetryCoordinator::new(provider, config.stream_name.clone(), config.retry_policy());

        debug!(
            stream = %config.stream_name,
            max_batch_count = config.max_batch_count,
            max_batch_bytes = config.max_batch_bytes,
            concurrency_limit = config.concurrency_limit,
            "Stream writer created"
        );

        Ok(Self {
            config,
            encoder,
            batcher,
            provisioner,
            coordinator,
        })
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn stream_name(&self) -> &str {
        &self.config.stream_name
    }

    /// Whether the stream has already been observed `Active`.
    pub fn is_ready(&self) -> bool {
        self.provisioner.is_ready()
    }

    /// Make sure the stream exists and is `Active`, creating it if needed.
    ///
    /// Called implicitly by every write; calling it up front moves the
    /// provisioning latency out of the first write.
    pub async fn ensure_ready(&self) -> Result<()> {
        self.provisioner.ensure_ready().await
    }

    /// Write `records` and wait for every one of them to settle.
    ///
    /// # Errors
    ///
    /// `StreamUnavailable` if the stream cannot be made `Active`; in that case
    /// no record was submitted. Every other problem is reported per record in
    /// the returned [`WriteResult`].
    pub async fn write<R>(&self, records: &[R]) -> Result<WriteResult>
    where
        R: Serialize,
    {
        self.write_with_cancel(records, &CancelHandle::new()).await
    }

    /// Like [`write`](Self::write), giving up after `timeout`.
    ///
    /// Records not delivered by then are reported as `Cancelled`.
    pub async fn write_with_timeout<R>(
        &self,
        records: &[R],
        timeout: Duration,
    ) -> Result<WriteResult>
    where
        R: Serialize,
    {
        let cancel = CancelHandle::new();
        let timer = cancel.cancel_after(timeout);
        let result = self.write_with_cancel(records, &cancel).await;
        timer.abort();
        result
    }

    /// Like [`write`](Self::write), stopping early once `cancel` fires.
    ///
    /// In-flight submissions and backoff sleeps are abandoned; records whose
    /// delivery was not confirmed are reported as `Cancelled`.
    pub async fn write_with_cancel<R>(
        &self,
        records: &[R],
        cancel: &CancelHandle,
    ) -> Result<WriteResult>
    where
        R: Serialize,
    {
        let stream_name = self.stream_name();
        let mut result = WriteResult::default();
        let mut entries = Vec::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            match self.encoder.encode(record) {
                Ok(encoded) => entries.push(BatchEntry::new(index, encoded)),
                Err(EncodeError::RecordTooLarge {
                    partition_key,
                    size,
                    limit,
                }) => {
                    warn!(
                        stream = %stream_name,
                        index,
                        size,
                        limit,
                        "Record exceeds size limit, skipping"
                    );
                    result.failures.push(RecordFailure {
                        index,
                        partition_key: Some(partition_key),
                        reason: FailureReason::TooLarge { size, limit },
                    });
                }
                Err(e) => {
                    warn!(stream = %stream_name, index, error = %e, "Record could not be encoded");
                    result.failures.push(RecordFailure {
                        index,
                        partition_key: None,
                        reason: FailureReason::Encoding(e.to_string()),
                    });
                }
            }
        }

        if entries.is_empty() {
            return Ok(self.finish(result));
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(stream = %stream_name, "Write cancelled during provisioning");
                result.failures.extend(entries.into_iter().map(|entry| RecordFailure {
                    index: entry.index,
                    partition_key: Some(entry.record.partition_key),
                    reason: FailureReason::Cancelled,
                }));
                return Ok(self.finish(result));
            }
            ready = self.provisioner.ensure_ready() => ready?,
        }

        let batches = self.batcher.batch(entries);
        debug!(
            stream = %stream_name,
            batch_count = batches.len(),
            "Submitting batches"
        );

        let fragments: Vec<WriteResult> = stream::iter(batches)
            .map(|batch| self.coordinator.submit(batch, cancel))
            .buffer_unordered(self.config.concurrency_limit)
            .collect()
            .await;

        for fragment in fragments {
            result.merge(fragment);
        }

        Ok(self.finish(result))
    }

    fn finish(&self, mut result: WriteResult) -> WriteResult {
        result.sort_by_index();

        let stream_name = self.stream_name();
        let too_large = result
            .failures
            .iter()
            .filter(|f| matches!(f.reason, FailureReason::TooLarge { .. }))
            .count();
        metrics::record_outcomes(stream_name, "succeeded", result.succeeded());
        metrics::record_outcomes(stream_name, "too_large", too_large);
        metrics::record_outcomes(stream_name, "failed", result.failed() - too_large);
        metrics::record_outcomes(stream_name, "cancelled", result.cancelled());

        info!(
            stream = %stream_name,
            total = result.total(),
            succeeded = result.succeeded(),
            failed = result.failed(),
            cancelled = result.cancelled(),
            "Write finished"
        );
        result
    }
}

/// Builder for [`StreamWriter`].
///
/// Only the provider and the stream name are required; every limit defaults
/// to the values documented on [`WriterConfig`].
pub struct StreamWriterBuilder {
    provider: Option<Arc<dyn StreamProvider>>,
    config: WriterConfig,
}

impl Default for StreamWriterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamWriterBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            config: WriterConfig::new(""),
        }
    }

    /// Set the stream provider (required).
    pub fn provider(mut self, provider: Arc<dyn StreamProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Replace the whole configuration, e.g. one loaded with
    /// [`WriterConfig::from_env`].
    pub fn config(mut self, config: WriterConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the target stream (required).
    pub fn stream_name(mut self, name: impl Into<String>) -> Self {
        self.config.stream_name = name.into();
        self
    }

    pub fn max_batch_count(mut self, count: usize) -> Self {
        self.config.max_batch_count = count;
        self
    }

    pub fn max_batch_bytes(mut self, bytes: usize) -> Self {
        self.config.max_batch_bytes = bytes;
        self
    }

    pub fn max_record_bytes(mut self, bytes: usize) -> Self {
        self.config.max_record_bytes = bytes;
        self
    }

    /// Total submissions per record, including the first (default: 5).
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.max_delay = delay;
        self
    }

    /// Batches in flight at once (default: 4).
    pub fn concurrency_limit(mut self, limit: usize) -> Self {
        self.config.concurrency_limit = limit;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn provision_timeout(mut self, timeout: Duration) -> Self {
        self.config.provision_timeout = timeout;
        self
    }

    pub fn shard_count(mut self, shards: u32) -> Self {
        self.config.shard_count = shards;
        self
    }

    pub fn partition_key(mut self, strategy: PartitionKeyStrategy) -> Self {
        self.config.partition_key = strategy;
        self
    }

    /// Validate the configuration and build the writer.
    ///
    /// # Errors
    ///
    /// `ConfigError` if no provider was set or a limit is invalid.
    pub fn build(self) -> Result<StreamWriter> {
        let provider = self
            .provider
            .ok_or_else(|| ClientError::ConfigError("provider is required".to_string()))?;
        StreamWriter::new(provider, self.config)
    }
}
