//! Integration tests for the write path.
//!
//! These tests drive `StreamWriter` against the in-process provider and verify:
//! 1. Records are packed into provider-sized batches in input order
//! 2. Oversized records are reported without affecting the rest
//! 3. The stream is provisioned exactly once, even under concurrency
//! 4. Nothing is submitted when the stream cannot be made active
//! 5. Batches in flight never exceed the concurrency limit

use async_trait::async_trait;
use serde_json::json;
use statementlog_client::{
    ClientError, FailureReason, MemoryStreamProvider, ProviderError, StreamProvider, StreamState,
    StreamWriter, SubmissionOutcome, WriterConfig,
};
use statementlog_core::{EncodedRecord, PartitionKeyStrategy, Statement};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Wraps the memory provider and records what each `put_records` call carried.
struct RecordingProvider {
    inner: MemoryStreamProvider,
    batches: Mutex<Vec<Vec<String>>>,
    put_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingProvider {
    fn new(inner: MemoryStreamProvider) -> Self {
        Self {
            inner,
            batches: Mutex::new(Vec::new()),
            put_delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn with_put_delay(mut self, delay: Duration) -> Self {
        self.put_delay = delay;
        self
    }

    fn batch_sizes(&self) -> Vec<usize> {
        let mut sizes: Vec<usize> = self.batches.lock().unwrap().iter().map(|b| b.len()).collect();
        sizes.sort_unstable();
        sizes
    }
}

#[async_trait]
impl StreamProvider for RecordingProvider {
    async fn create_stream(&self, name: &str, shard_count: u32) -> Result<(), ProviderError> {
        self.inner.create_stream(name, shard_count).await
    }

    async fn describe_stream(&self, name: &str) -> Result<StreamState, ProviderError> {
        self.inner.describe_stream(name).await
    }

    async fn put_records(
        &self,
        name: &str,
        records: &[EncodedRecord],
    ) -> Result<Vec<SubmissionOutcome>, ProviderError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.batches
            .lock()
            .unwrap()
            .push(records.iter().map(|r| r.partition_key.clone()).collect());

        if !self.put_delay.is_zero() {
            tokio::time::sleep(self.put_delay).await;
        }
        let outcomes = self.inner.put_records(name, records).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcomes
    }
}

fn statements(count: usize) -> Vec<Statement> {
    (0..count)
        .map(|i| {
            let subject = format!("b{}", 10_000_000 + i);
            Statement::new(subject, "dcterms:identifier", 10004, i.to_string())
                .with_object_id(format!("urn:bnum:{}", i))
                .with_source_record_path("id")
        })
        .collect()
}

#[tokio::test]
async fn test_1200_records_split_into_three_batches() {
    let provider = Arc::new(RecordingProvider::new(MemoryStreamProvider::new()));
    let writer = StreamWriter::builder()
        .provider(provider.clone())
        .stream_name("statements")
        .build()
        .unwrap();

    let result = writer.write(&statements(1200)).await.unwrap();

    assert_eq!(result.succeeded(), 1200);
    assert!(result.is_complete());
    assert_eq!(provider.batch_sizes(), vec![200, 500, 500]);
    assert_eq!(provider.inner.records("statements").await.len(), 1200);

    // Result is ordered by input position
    for (i, receipt) in result.delivered.iter().enumerate() {
        assert_eq!(receipt.index, i);
        assert_eq!(receipt.attempts, 1);
    }
}

#[tokio::test]
async fn test_batches_preserve_input_order() {
    let provider = Arc::new(RecordingProvider::new(MemoryStreamProvider::new()));
    let writer = StreamWriter::builder()
        .provider(provider.clone())
        .stream_name("statements")
        .partition_key(PartitionKeyStrategy::fields(["subject_id"]))
        .max_batch_count(4)
        .concurrency_limit(1)
        .build()
        .unwrap();

    let records = statements(10);
    writer.write(&records).await.unwrap();

    let flattened: Vec<String> = provider.batches.lock().unwrap().concat();
    let expected: Vec<String> = records.iter().map(|s| s.subject_id.clone()).collect();
    assert_eq!(flattened, expected);
    assert_eq!(provider.batch_sizes(), vec![2, 4, 4]);
}

#[tokio::test]
async fn test_oversized_record_is_reported_and_others_proceed() {
    let provider = Arc::new(MemoryStreamProvider::new());
    let writer = StreamWriter::builder()
        .provider(provider.clone())
        .stream_name("statements")
        .build()
        .unwrap();

    let records = vec![
        json!({"subject_id": "a", "predicate": "p"}),
        json!({"subject_id": "big", "object_literal": "x".repeat(2 * 1024 * 1024)}),
        json!({"subject_id": "c", "predicate": "p"}),
    ];
    let result = writer.write(&records).await.unwrap();

    assert_eq!(result.succeeded(), 2);
    assert_eq!(result.failed(), 1);

    let failure = result.failure_for(1).unwrap();
    assert!(failure.partition_key.is_some());
    match failure.reason {
        FailureReason::TooLarge { size, limit } => {
            assert!(size > 2 * 1024 * 1024);
            assert_eq!(limit, 1024 * 1024);
        }
        ref other => panic!("expected TooLarge, got {:?}", other),
    }
    assert_eq!(provider.records("statements").await.len(), 2);
}

#[tokio::test]
async fn test_all_records_oversized_skips_provisioning() {
    let provider = Arc::new(MemoryStreamProvider::new());
    let writer = StreamWriter::builder()
        .provider(provider.clone())
        .stream_name("statements")
        .max_record_bytes(64)
        .build()
        .unwrap();

    let result = writer
        .write(&[json!({"object_literal": "y".repeat(100)})])
        .await
        .unwrap();

    assert_eq!(result.failed(), 1);
    assert_eq!(provider.describe_calls(), 0);
    assert_eq!(provider.put_calls(), 0);
}

#[tokio::test]
async fn test_unavailable_stream_submits_nothing() {
    let provider =
        Arc::new(MemoryStreamProvider::new().with_stream("statements", StreamState::Deleting));
    let writer = StreamWriter::builder()
        .provider(provider.clone())
        .stream_name("statements")
        .build()
        .unwrap();

    let err = writer.write(&statements(3)).await.unwrap_err();

    assert!(matches!(
        err,
        ClientError::StreamUnavailable { ref stream, .. } if stream == "statements"
    ));
    assert_eq!(provider.put_calls(), 0);
    assert_eq!(provider.create_calls(), 0);
    assert!(!writer.is_ready());
}

#[tokio::test]
async fn test_provisioning_recovers_on_next_write() {
    let provider =
        Arc::new(MemoryStreamProvider::new().with_stream("statements", StreamState::Deleting));
    let writer = StreamWriter::builder()
        .provider(provider.clone())
        .stream_name("statements")
        .poll_interval(Duration::from_millis(2))
        .build()
        .unwrap();

    assert!(writer.write(&statements(1)).await.is_err());

    provider.set_state("statements", StreamState::Absent).await;
    let result = writer.write(&statements(1)).await.unwrap();
    assert_eq!(result.succeeded(), 1);
    assert_eq!(provider.create_calls(), 1);
}

#[tokio::test]
async fn test_concurrent_writers_create_stream_once() {
    let provider = Arc::new(MemoryStreamProvider::new().with_activation_after(3));
    let writer = Arc::new(
        StreamWriter::builder()
            .provider(provider.clone())
            .stream_name("statements")
            .poll_interval(Duration::from_millis(5))
            .build()
            .unwrap(),
    );

    let mut handles = Vec::new();
    for _ in 0..10 {
        let writer = Arc::clone(&writer);
        handles.push(tokio::spawn(async move { writer.write(&statements(5)).await }));
    }
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.succeeded(), 5);
    }

    assert_eq!(provider.create_calls(), 1);
    assert_eq!(provider.records("statements").await.len(), 50);
}

#[tokio::test]
async fn test_ready_stream_is_not_described_again() {
    let provider = Arc::new(MemoryStreamProvider::new());
    let writer = StreamWriter::builder()
        .provider(provider.clone())
        .stream_name("statements")
        .build()
        .unwrap();

    writer.ensure_ready().await.unwrap();
    let describes = provider.describe_calls();

    writer.write(&statements(3)).await.unwrap();
    writer.write(&statements(3)).await.unwrap();

    assert_eq!(provider.describe_calls(), describes);
    assert_eq!(provider.create_calls(), 1);
}

#[tokio::test]
async fn test_concurrency_limit_bounds_in_flight_batches() {
    let provider = Arc::new(
        RecordingProvider::new(MemoryStreamProvider::new())
            .with_put_delay(Duration::from_millis(20)),
    );
    let writer = StreamWriter::builder()
        .provider(provider.clone())
        .stream_name("statements")
        .max_batch_count(10)
        .concurrency_limit(3)
        .build()
        .unwrap();

    let result = writer.write(&statements(100)).await.unwrap();

    assert_eq!(result.succeeded(), 100);
    assert_eq!(provider.batch_sizes().len(), 10);
    let max = provider.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 3, "max in flight was {}", max);
    assert!(max >= 2, "batches did not overlap");
}

#[tokio::test]
async fn test_stored_payload_decodes_to_statement() {
    let provider = Arc::new(MemoryStreamProvider::new());
    let writer = StreamWriter::builder()
        .provider(provider.clone())
        .stream_name("statements")
        .build()
        .unwrap();

    let records = statements(1);
    writer.write(&records).await.unwrap();

    let stored = provider.records("statements").await;
    let decoded: Statement = stored[0].record.decode().unwrap();
    assert_eq!(decoded, records[0]);
}

#[tokio::test]
async fn test_writer_from_config() {
    let vars = [("STREAM_NAME", "statements"), ("STREAM_MAX_BATCH_COUNT", "2")];
    let config = WriterConfig::from_lookup(|name| {
        vars.iter().find(|(k, _)| *k == name).map(|(_, v)| v.to_string())
    })
    .unwrap();

    let provider = Arc::new(RecordingProvider::new(MemoryStreamProvider::new()));
    let writer = StreamWriter::builder()
        .provider(provider.clone())
        .config(config)
        .build()
        .unwrap();

    writer.write(&statements(5)).await.unwrap();
    assert_eq!(provider.batch_sizes(), vec![1, 2, 2]);
}
