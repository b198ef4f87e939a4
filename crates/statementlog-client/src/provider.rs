//! Stream provider seam.
//!
//! The writer depends on exactly three provider operations: create a stream,
//! describe its state, and append a batch of records. Anything exposing this
//! trio can back a [`StreamWriter`](crate::StreamWriter): a managed log service
//! ([`KinesisProvider`](crate::kinesis::KinesisProvider) behind the `kinesis`
//! feature), the in-process [`MemoryStreamProvider`](crate::MemoryStreamProvider),
//! or a test double.
//!
//! ## Partial Failures
//!
//! `put_records` returns one [`SubmissionOutcome`] per input record, in input
//! order. A batch can partly succeed; the failed entries carry the provider's
//! error code, which [`RetryPolicy::is_retryable`](crate::RetryPolicy::is_retryable)
//! classifies as transient or permanent.

use async_trait::async_trait;
use statementlog_core::EncodedRecord;
use thiserror::Error;

/// Provider error codes the writer knows about.
pub mod codes {
    pub const THROUGHPUT_EXCEEDED: &str = "ProvisionedThroughputExceededException";
    pub const INTERNAL_FAILURE: &str = "InternalFailure";
    pub const SERVICE_UNAVAILABLE: &str = "ServiceUnavailable";
    pub const THROTTLING: &str = "ThrottlingException";
    pub const KMS_THROTTLING: &str = "KMSThrottlingException";
    pub const LIMIT_EXCEEDED: &str = "LimitExceededException";
    pub const RESOURCE_IN_USE: &str = "ResourceInUseException";
    pub const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";
    pub const ACCESS_DENIED: &str = "AccessDeniedException";
    pub const VALIDATION: &str = "ValidationException";
    pub const INVALID_ARGUMENT: &str = "InvalidArgumentException";

    /// Transient codes; everything else is permanent.
    pub fn is_transient(code: &str) -> bool {
        matches!(
            code,
            THROUGHPUT_EXCEEDED
                | INTERNAL_FAILURE
                | SERVICE_UNAVAILABLE
                | THROTTLING
                | KMS_THROTTLING
                | LIMIT_EXCEEDED
        )
    }
}

/// Lifecycle state of a stream as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    Absent,
    Creating,
    Active,
    Updating,
    Deleting,
    Unknown,
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Absent => "ABSENT",
            Self::Creating => "CREATING",
            Self::Active => "ACTIVE",
            Self::Updating => "UPDATING",
            Self::Deleting => "DELETING",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Result of submitting one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Success {
        sequence_number: String,
        shard_id: String,
    },
    Failure {
        code: String,
        message: String,
    },
}

impl SubmissionOutcome {
    pub fn success(sequence_number: impl Into<String>, shard_id: impl Into<String>) -> Self {
        Self::Success {
            sequence_number: sequence_number.into(),
            shard_id: shard_id.into(),
        }
    }

    pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failure {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// A failed provider call, identified by the provider's error code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// The three provider operations the writer consumes.
///
/// Implementations must be `Send + Sync` so one provider can be shared by the
/// provisioner and every in-flight batch via `Arc<dyn StreamProvider>`.
#[async_trait]
pub trait StreamProvider: Send + Sync {
    /// Create the stream. Fails with `ResourceInUseException` if it exists.
    async fn create_stream(&self, name: &str, shard_count: u32) -> Result<(), ProviderError>;

    /// Current state of the stream; `Absent` when it does not exist.
    async fn describe_stream(&self, name: &str) -> Result<StreamState, ProviderError>;

    /// Append records, returning one outcome per record in input order.
    async fn put_records(
        &self,
        name: &str,
        records: &[EncodedRecord],
    ) -> Result<Vec<SubmissionOutcome>, ProviderError>;
}
