//! In-process stream provider.
//!
//! [`MemoryStreamProvider`] keeps streams in a map behind a `tokio::sync::Mutex`
//! and behaves like the managed service where it matters to the writer:
//!
//! - `create_stream` on an existing stream fails with `ResourceInUseException`
//! - a created stream reports `Creating` for a configurable number of describes
//! - `put_records` on a missing or inactive stream fails with `ResourceNotFoundException`
//! - accepted records get increasing sequence numbers and a shard chosen from
//!   the partition key
//!
//! Every call is counted, and a fault hook can fail individual records, which
//! makes it the provider used throughout the writer's tests.

use crate::provider::{codes, ProviderError, StreamProvider, StreamState, SubmissionOutcome};
use async_trait::async_trait;
use statementlog_core::EncodedRecord;
use siphasher::sip::SipHasher;
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Decides the fate of one record in one `put_records` call.
///
/// Receives the 1-based call number and the record; returning
/// `Some((code, message))` fails that record, `None` accepts it.
pub type FaultHook = Arc<dyn Fn(u64, &EncodedRecord) -> Option<(String, String)> + Send + Sync>;

/// A record accepted by the memory provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub sequence_number: String,
    pub shard_id: String,
    pub record: EncodedRecord,
}

#[derive(Debug)]
struct MemoryStream {
    state: StreamState,
    shard_count: u32,
    describes_since_create: u32,
    records: Vec<StoredRecord>,
    next_sequence: u64,
}

impl MemoryStream {
    fn new(state: StreamState, shard_count: u32) -> Self {
        Self {
            state,
            shard_count: shard_count.max(1),
            describes_since_create: 0,
            records: Vec::new(),
            next_sequence: 1,
        }
    }

    fn append(&mut self, record: &EncodedRecord) -> SubmissionOutcome {
        // Fixed-key SipHash keeps shard assignment stable across builds
        let mut hasher = SipHasher::new();
        hasher.write(record.partition_key.as_bytes());
        let shard = hasher.finish() % self.shard_count as u64;

        let stored = StoredRecord {
            sequence_number: format!("{:020}", self.next_sequence),
            shard_id: format!("shardId-{:012}", shard),
            record: record.clone(),
        };
        self.next_sequence += 1;

        let outcome =
            SubmissionOutcome::success(stored.sequence_number.clone(), stored.shard_id.clone());
        self.records.push(stored);
        outcome
    }
}

/// Stream provider backed by process memory.
pub struct MemoryStreamProvider {
    streams: Mutex<HashMap<String, MemoryStream>>,
    /// Describes a created stream answers `Creating` before turning `Active`
    activation_describes: u32,
    fault: Option<FaultHook>,
    put_call_no: AtomicU64,
    create_calls: AtomicUsize,
    describe_calls: AtomicUsize,
    put_calls: AtomicUsize,
}

impl Default for MemoryStreamProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStreamProvider {
    /// Streams created through this provider are `Active` immediately.
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            activation_describes: 0,
            fault: None,
            put_call_no: AtomicU64::new(0),
            create_calls: AtomicUsize::new(0),
            describe_calls: AtomicUsize::new(0),
            put_calls: AtomicUsize::new(0),
        }
    }

    /// Created streams stay `Creating` for `describes` describe calls.
    pub fn with_activation_after(mut self, describes: u32) -> Self {
        self.activation_describes = describes;
        self
    }

    pub fn with_fault<F>(mut self, hook: F) -> Self
    where
        F: Fn(u64, &EncodedRecord) -> Option<(String, String)> + Send + Sync + 'static,
    {
        self.fault = Some(Arc::new(hook));
        self
    }

    /// Register a stream in `state` without going through `create_stream`.
    pub fn with_stream(mut self, name: impl Into<String>, state: StreamState) -> Self {
        self.streams
            .get_mut()
            .insert(name.into(), MemoryStream::new(state, 1));
        self
    }

    /// Force the state of a stream; `Absent` removes it.
    pub async fn set_state(&self, name: &str, state: StreamState) {
        let mut streams = self.streams.lock().await;
        if state == StreamState::Absent {
            streams.remove(name);
        } else {
            streams
                .entry(name.to_string())
                .or_insert_with(|| MemoryStream::new(state, 1))
                .state = state;
        }
    }

    /// Records accepted so far, in acceptance order.
    pub async fn records(&self, name: &str) -> Vec<StoredRecord> {
        self.streams
            .lock()
            .await
            .get(name)
            .map(|s| s.records.clone())
            .unwrap_or_default()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamProvider for MemoryStreamProvider {
    async fn create_stream(&self, name: &str, shard_count: u32) -> Result<(), ProviderError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut streams = self.streams.lock().await;

        if streams.contains_key(name) {
            return Err(ProviderError::new(
                codes::RESOURCE_IN_USE,
                format!("Stream {} already exists", name),
            ));
        }

        let state = if self.activation_describes == 0 {
            StreamState::Active
        } else {
            StreamState::Creating
        };
        streams.insert(name.to_string(), MemoryStream::new(state, shard_count));
        Ok(())
    }

    async fn describe_stream(&self, name: &str) -> Result<StreamState, ProviderError> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        let mut streams = self.streams.lock().await;

        let Some(stream) = streams.get_mut(name) else {
            return Ok(StreamState::Absent);
        };

        if stream.state == StreamState::Creating {
            stream.describes_since_create += 1;
            if stream.describes_since_create > self.activation_describes {
                stream.state = StreamState::Active;
            }
        }
        Ok(stream.state)
    }

    async fn put_records(
        &self,
        name: &str,
        records: &[EncodedRecord],
    ) -> Result<Vec<SubmissionOutcome>, ProviderError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let call_no = self.put_call_no.fetch_add(1, Ordering::SeqCst) + 1;
        let mut streams = self.streams.lock().await;

        let stream = match streams.get_mut(name) {
            Some(s) if matches!(s.state, StreamState::Active | StreamState::Updating) => s,
            _ => {
                return Err(ProviderError::new(
                    codes::RESOURCE_NOT_FOUND,
                    format!("Stream {} not found", name),
                ))
            }
        };

        Ok(records
            .iter()
            .map(|record| {
                let fault = self.fault.as_ref().and_then(|hook| hook(call_no, record));
                match fault {
                    Some((code, message)) => SubmissionOutcome::failure(code, message),
                    None => stream.append(record),
                }
            })
            .collect())
    }
}
