//! Error Types for statementlog records
//!
//! Errors raised while turning a caller's record into the bytes the stream
//! provider accepts. They are local to one record: the writer reports them in
//! the write result and keeps going with the rest of the call.
//!
//! ## Error Categories
//!
//! - `RecordTooLarge`: the encoded record (partition key + payload) exceeds the
//!   provider's per-record byte limit. Carries the derived partition key so the
//!   caller can still identify the record.
//! - `Serialization`: the record could not be serialized to JSON, or a payload
//!   could not be decoded back into a record

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Record with partition key '{partition_key}' is {size} bytes, exceeding the {limit} byte limit")]
    RecordTooLarge {
        partition_key: String,
        size: usize,
        limit: usize,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
