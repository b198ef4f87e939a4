//! Write results.
//!
//! A [`WriteResult`] accounts for every record of a `write()` call: each one is
//! either delivered (with the provider's sequence number) or failed with a
//! [`FailureReason`]. Entries carry the record's position in the caller's input
//! and its partition key, so callers can tell exactly what to resubmit.

/// A record the provider accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordReceipt {
    /// Position in the caller's input
    pub index: usize,
    pub partition_key: String,
    pub sequence_number: String,
    pub shard_id: String,
    /// Submission attempts it took, starting at 1
    pub attempts: u32,
}

/// Why a record was not delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Larger than the per-record limit; never submitted.
    TooLarge { size: usize, limit: usize },

    /// Could not be serialized; never submitted.
    Encoding(String),

    /// Permanent provider error; not retried.
    Rejected { code: String, message: String },

    /// Still failing with a transient error after the last attempt.
    Exhausted {
        code: String,
        message: String,
        attempts: u32,
    },

    /// The caller cancelled before the record was delivered.
    Cancelled,
}

impl FailureReason {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TooLarge { .. } => "too_large",
            Self::Encoding(_) => "encoding",
            Self::Rejected { .. } => "rejected",
            Self::Exhausted { .. } => "exhausted",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Provider error code, when the provider was involved.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Rejected { code, .. } | Self::Exhausted { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooLarge { size, limit } => {
                write!(f, "record is {} bytes, limit is {}", size, limit)
            }
            Self::Encoding(msg) => write!(f, "encoding failed: {}", msg),
            Self::Rejected { code, message } => write!(f, "rejected ({}): {}", code, message),
            Self::Exhausted {
                code,
                message,
                attempts,
            } => write!(
                f,
                "gave up after {} attempts ({}): {}",
                attempts, code, message
            ),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// A record that was not delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    /// Position in the caller's input
    pub index: usize,
    /// `None` only when the record could not be serialized
    pub partition_key: Option<String>,
    pub reason: FailureReason,
}

/// Outcome of one `write()` call (or one batch of it).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteResult {
    pub delivered: Vec<RecordReceipt>,
    pub failures: Vec<RecordFailure>,
}

impl WriteResult {
    pub fn succeeded(&self) -> usize {
        self.delivered.len()
    }

    /// Records that failed for any reason other than cancellation.
    pub fn failed(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| !f.reason.is_cancelled())
            .count()
    }

    pub fn cancelled(&self) -> usize {
        self.failures
            .iter()
            .filter(|f| f.reason.is_cancelled())
            .count()
    }

    pub fn total(&self) -> usize {
        self.delivered.len() + self.failures.len()
    }

    /// `true` if every record was delivered.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Absorb another fragment.
    pub fn merge(&mut self, other: WriteResult) {
        self.delivered.extend(other.delivered);
        self.failures.extend(other.failures);
    }

    /// Order entries by their position in the caller's input.
    pub fn sort_by_index(&mut self) {
        self.delivered.sort_by_key(|r| r.index);
        self.failures.sort_by_key(|f| f.index);
    }

    pub fn failure_for(&self, index: usize) -> Option<&RecordFailure> {
        self.failures.iter().find(|f| f.index == index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt(index: usize) -> RecordReceipt {
        RecordReceipt {
            index,
            partition_key: format!("k{}", index),
            sequence_number: index.to_string(),
            shard_id: "shardId-000000000000".to_string(),
            attempts: 1,
        }
    }

    fn failure(index: usize, reason: FailureReason) -> RecordFailure {
        RecordFailure {
            index,
            partition_key: Some(format!("k{}", index)),
            reason,
        }
    }

    #[test]
    fn test_counts_separate_cancelled_from_failed() {
        let result = WriteResult {
            delivered: vec![receipt(0)],
            failures: vec![
                failure(1, FailureReason::Cancelled),
                failure(
                    2,
                    FailureReason::Rejected {
                        code: "AccessDeniedException".to_string(),
                        message: "denied".to_string(),
                    },
                ),
                failure(3, FailureReason::TooLarge { size: 10, limit: 5 }),
            ],
        };

        assert_eq!(result.succeeded(), 1);
        assert_eq!(result.failed(), 2);
        assert_eq!(result.cancelled(), 1);
        assert_eq!(result.total(), 4);
        assert!(!result.is_complete());
    }

    #[test]
    fn test_merge_and_sort() {
        let mut a = WriteResult {
            delivered: vec![receipt(4), receipt(1)],
            failures: vec![],
        };
        let b = WriteResult {
            delivered: vec![receipt(0)],
            failures: vec![failure(3, FailureReason::Cancelled)],
        };

        a.merge(b);
        a.sort_by_index();

        let indexes: Vec<usize> = a.delivered.iter().map(|r| r.index).collect();
        assert_eq!(indexes, vec![0, 1, 4]);
        assert!(a.failure_for(3).is_some());
        assert!(a.failure_for(2).is_none());
    }

    #[test]
    fn test_reason_kind_and_code() {
        let exhausted = FailureReason::Exhausted {
            code: "ProvisionedThroughputExceededException".to_string(),
            message: "slow down".to_string(),
            attempts: 5,
        };
        assert_eq!(exhausted.kind(), "exhausted");
        assert_eq!(exhausted.code(), Some("ProvisionedThroughputExceededException"));
        assert_eq!(
            exhausted.to_string(),
            "gave up after 5 attempts (ProvisionedThroughputExceededException): slow down"
        );
        assert_eq!(FailureReason::Cancelled.code(), None);
    }
}
