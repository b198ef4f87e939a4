//! Retry Logic with Exponential Backoff
//!
//! This module drives the submission of one batch: it sends the batch, reads the
//! per-record outcomes, and resubmits only the records that failed with a
//! transient error.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  submit(batch)   │ RetryCoordinator
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────────────────┐
//! │  put_records(pending)        │ ◄──────────────┐
//! └────────┬─────────────────────┘                │
//!          │ one outcome per record               │
//!          ├─→ Success ─────────→ delivered       │
//!          ├─→ Permanent ───────→ Rejected        │
//!          └─→ Transient ───────→ pending ── backoff
//!                                   │
//!                                   └─→ attempts exhausted → Exhausted
//! ```
//!
//! ## Retryable vs Non-Retryable Errors
//!
//! **Retryable** (transient failures):
//! - `ProvisionedThroughputExceededException`: shard write capacity exceeded
//! - `ThrottlingException`, `KMSThrottlingException`, `LimitExceededException`
//! - `InternalFailure`, `ServiceUnavailable`: temporary provider errors
//!
//! **Non-Retryable** (permanent failures):
//! - `ValidationException`, `InvalidArgumentException`: malformed record
//! - `AccessDeniedException`: authorization failure
//! - `ResourceNotFoundException`: the stream is gone
//! - Every other code
//!
//! ## Backoff
//!
//! ```text
//! backoff(n) = min(max_delay, base_delay * 2^n) + jitter,  jitter ∈ [0, 25% of that]
//!
//! With defaults (100ms base, 10s max, 5 attempts):
//! - Attempt 1: immediate
//! - Attempt 2: after ~100ms
//! - Attempt 3: after ~200ms
//! - Attempt 4: after ~400ms
//! - Attempt 5: after ~800ms
//! ```
//!
//! Each batch owns its attempt counter and backoff schedule; sleeping only
//! suspends that batch's task.

use crate::batch::{Batch, BatchEntry};
use crate::cancel::CancelHandle;
use crate::provider::{codes, ProviderError, StreamProvider, SubmissionOutcome};
use crate::result::{FailureReason, RecordFailure, RecordReceipt, WriteResult};
use statementlog_core::EncodedRecord;
use statementlog_observability::metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy configuration for exponential backoff.
///
/// # Fields
///
/// * `max_attempts` - Total submissions per record, including the first (default: 5)
/// * `base_delay` - Backoff before the second attempt (default: 100ms)
/// * `max_delay` - Cap on the exponential part of the backoff (default: 10s)
/// * `jitter` - Upper bound of the random extra delay, as a fraction (default: 0.25)
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            ..Self::default()
        }
    }

    /// Backoff before retry number `retry` (0-indexed), without jitter.
    ///
    /// `min(max_delay, base_delay * 2^retry)`
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.min(31));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// [`backoff`](Self::backoff) plus a random extra delay of up to
    /// `jitter * backoff`, spreading out retries from concurrent batches.
    pub fn jittered_backoff(&self, retry: u32) -> Duration {
        let base = self.backoff(retry);
        let extra = base.as_secs_f64() * self.jitter.max(0.0) * rand::random::<f64>();
        base + Duration::from_secs_f64(extra)
    }

    /// Check if a provider error code is transient.
    pub fn is_retryable(&self, code: &str) -> bool {
        codes::is_transient(code)
    }
}

/// Submits batches and resubmits their transient failures.
#[derive(Clone)]
pub struct RetryCoordinator {
    provider: Arc<dyn StreamProvider>,
    stream: String,
    policy: RetryPolicy,
}

impl RetryCoordinator {
    pub fn new(
        provider: Arc<dyn StreamProvider>,
        stream: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            stream: stream.into(),
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Submit a batch until every record is delivered, permanently rejected,
    /// out of attempts, or cancelled.
    ///
    /// # Behavior
    ///
    /// 1. Send all pending records in one `put_records` call
    /// 2. Deliver successes, reject permanent failures
    /// 3. If transient failures remain and attempts are left: back off, then
    ///    resubmit only those records in their original relative order
    /// 4. Out of attempts: report the remaining records as `Exhausted`
    ///
    /// Cancellation is checked before each attempt and raced against the
    /// provider call and the backoff sleep. Records not yet delivered at that
    /// point are reported as `Cancelled`.
    ///
    /// Never returns an error: every record of the batch appears exactly once
    /// in the returned fragment.
    pub async fn submit(&self, batch: Batch, cancel: &CancelHandle) -> WriteResult {
        let mut result = WriteResult::default();
        let mut pending = batch.into_entries();
        let mut attempt: u32 = 0;

        metrics::observe_batch(&self.stream, pending.len());

        while !pending.is_empty() {
            if cancel.is_cancelled() {
                mark_cancelled(&mut result, pending);
                break;
            }

            attempt += 1;
            let records: Vec<EncodedRecord> = pending.iter().map(|e| e.record.clone()).collect();
            metrics::record_submission(&self.stream);

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(stream = %self.stream, attempt, "Submission cancelled in flight");
                    mark_cancelled(&mut result, pending);
                    break;
                }
                response = self.provider.put_records(&self.stream, &records) => response,
            };
            let outcomes = normalize_outcomes(response, records.len());

            let mut retryable: Vec<(BatchEntry, String, String)> = Vec::new();
            for (entry, outcome) in pending.into_iter().zip(outcomes) {
                match outcome {
                    SubmissionOutcome::Success {
                        sequence_number,
                        shard_id,
                    } => result.delivered.push(RecordReceipt {
                        index: entry.index,
                        partition_key: entry.record.partition_key,
                        sequence_number,
                        shard_id,
                        attempts: attempt,
                    }),
                    SubmissionOutcome::Failure { code, message }
                        if self.policy.is_retryable(&code) =>
                    {
                        retryable.push((entry, code, message));
                    }
                    SubmissionOutcome::Failure { code, message } => {
                        warn!(
                            stream = %self.stream,
                            index = entry.index,
                            code = %code,
                            message = %message,
                            "Non-retryable error, giving up on record"
                        );
                        result.failures.push(RecordFailure {
                            index: entry.index,
                            partition_key: Some(entry.record.partition_key),
                            reason: FailureReason::Rejected { code, message },
                        });
                    }
                }
            }

            if retryable.is_empty() {
                if attempt > 1 {
                    debug!(stream = %self.stream, attempt, "Batch settled after retry");
                }
                break;
            }

            if attempt >= self.policy.max_attempts {
                warn!(
                    stream = %self.stream,
                    attempt,
                    max_attempts = self.policy.max_attempts,
                    record_count = retryable.len(),
                    code = %retryable[0].1,
                    "Max attempts exhausted, giving up"
                );
                for (entry, code, message) in retryable {
                    result.failures.push(RecordFailure {
                        index: entry.index,
                        partition_key: Some(entry.record.partition_key),
                        reason: FailureReason::Exhausted {
                            code,
                            message,
                            attempts: attempt,
                        },
                    });
                }
                break;
            }

            let backoff = self.policy.jittered_backoff(attempt - 1);
            warn!(
                stream = %self.stream,
                attempt,
                max_attempts = self.policy.max_attempts,
                record_count = retryable.len(),
                backoff_ms = backoff.as_millis() as u64,
                code = %retryable[0].1,
                "Retryable errors, backing off"
            );
            metrics::record_retries(&self.stream, retryable.len());
            pending = retryable.into_iter().map(|(entry, _, _)| entry).collect();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(stream = %self.stream, attempt, "Backoff cancelled");
                    mark_cancelled(&mut result, pending);
                    break;
                }
                _ = sleep(backoff) => {}
            }
        }

        result
    }
}

fn mark_cancelled(result: &mut WriteResult, entries: Vec<BatchEntry>) {
    result
        .failures
        .extend(entries.into_iter().map(|entry| RecordFailure {
            index: entry.index,
            partition_key: Some(entry.record.partition_key),
            reason: FailureReason::Cancelled,
        }));
}

/// Turn a provider response into exactly `expected` outcomes.
///
/// A failed call applies its error to every record. A response with the wrong
/// number of outcomes cannot be matched to records, so every record is treated
/// as a transient internal failure and resubmitted.
fn normalize_outcomes(
    response: Result<Vec<SubmissionOutcome>, ProviderError>,
    expected: usize,
) -> Vec<SubmissionOutcome> {
    match response {
        Ok(outcomes) if outcomes.len() == expected => outcomes,
        Ok(outcomes) => {
            warn!(
                expected,
                received = outcomes.len(),
                "Provider returned mismatched outcome count"
            );
            vec![
                SubmissionOutcome::failure(
                    codes::INTERNAL_FAILURE,
                    format!(
                        "provider returned {} outcomes for {} records",
                        outcomes.len(),
                        expected
                    ),
                );
                expected
            ]
        }
        Err(err) => vec![SubmissionOutcome::failure(err.code, err.message); expected],
    }
}
