//! Record Encoding
//!
//! Turns a caller's record into an [`EncodedRecord`]: the partition key and the
//! opaque payload bytes the stream provider stores.
//!
//! ## Payload
//!
//! Payloads are compact JSON. The record is first converted to a
//! `serde_json::Value`, whose object keys are ordered, so two equal records
//! always produce identical bytes regardless of struct field order.
//!
//! ## Partition Keys
//!
//! ```text
//! record ──► Value ──► selected fields ──┬─► Hashed: siphash(a|b|c) → "9f2c…" (16 hex chars)
//!                                        └─► Fields: "a|b|c" (max 256 bytes)
//! ```
//!
//! Records sharing the selected fields land on the same shard, which keeps
//! per-entity ordering for consumers. If none of the selected fields are present
//! the payload itself is hashed.
//!
//! ## Size Accounting
//!
//! Providers count the partition key and the payload against their per-record
//! and per-batch limits, so [`EncodedRecord::size_bytes`] is the sum of both.

use crate::error::{Error, Result};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use siphasher::sip::SipHasher;
use std::hash::Hasher;

/// Longest partition key providers accept, in bytes.
pub const MAX_PARTITION_KEY_BYTES: usize = 256;

/// Default per-record limit (1 MiB).
pub const DEFAULT_MAX_RECORD_BYTES: usize = 1024 * 1024;

/// A record ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRecord {
    /// Key the provider hashes to pick a shard
    pub partition_key: String,

    /// Compact JSON of the full record
    pub payload: Bytes,
}

impl EncodedRecord {
    pub fn new(partition_key: impl Into<String>, payload: Bytes) -> Self {
        Self {
            partition_key: partition_key.into(),
            payload,
        }
    }

    /// Bytes this record counts against provider limits (key + payload).
    pub fn size_bytes(&self) -> usize {
        self.partition_key.len() + self.payload.len()
    }

    /// Decode the payload back into a record.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// How the partition key is derived from a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionKeyStrategy {
    /// Stable hash of the selected field values.
    Hashed { fields: Vec<String> },

    /// Selected field values joined with `|`.
    Fields { fields: Vec<String> },
}

impl Default for PartitionKeyStrategy {
    fn default() -> Self {
        Self::Hashed {
            fields: vec!["subject_id".to_string()],
        }
    }
}

impl PartitionKeyStrategy {
    pub fn hashed<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Hashed {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fields {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    fn field_names(&self) -> &[String] {
        match self {
            Self::Hashed { fields } | Self::Fields { fields } => fields,
        }
    }

    /// Derive the partition key for a serialized record.
    ///
    /// `payload` is hashed when none of the selected fields are present or
    /// they all render to an empty string.
    pub fn derive(&self, value: &Value, payload: &[u8]) -> String {
        let parts: Vec<String> = self
            .field_names()
            .iter()
            .filter_map(|name| value.get(name))
            .map(render_field)
            .collect();

        let joined = parts.join("|");
        if joined.chars().all(|c| c == '|') {
            return stable_hash(payload);
        }

        match self {
            Self::Hashed { .. } => stable_hash(joined.as_bytes()),
            Self::Fields { .. } => truncate_to_boundary(joined, MAX_PARTITION_KEY_BYTES),
        }
    }
}

fn render_field(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// SipHash with fixed keys, so the same input maps to the same key across
/// processes and releases.
fn stable_hash(bytes: &[u8]) -> String {
    let mut hasher = SipHasher::new();
    hasher.write(bytes);
    format!("{:016x}", hasher.finish())
}

fn truncate_to_boundary(mut key: String, max_bytes: usize) -> String {
    if key.len() <= max_bytes {
        return key;
    }
    let mut end = max_bytes;
    while !key.is_char_boundary(end) {
        end -= 1;
    }
    key.truncate(end);
    key
}

/// Serializes records and enforces the per-record size limit.
#[derive(Debug, Clone)]
pub struct RecordEncoder {
    strategy: PartitionKeyStrategy,
    max_record_bytes: usize,
}

impl Default for RecordEncoder {
    fn default() -> Self {
        Self::new(PartitionKeyStrategy::default(), DEFAULT_MAX_RECORD_BYTES)
    }
}

impl RecordEncoder {
    pub fn new(strategy: PartitionKeyStrategy, max_record_bytes: usize) -> Self {
        Self {
            strategy,
            max_record_bytes,
        }
    }

    pub fn strategy(&self) -> &PartitionKeyStrategy {
        &self.strategy
    }

    pub fn max_record_bytes(&self) -> usize {
        self.max_record_bytes
    }

    /// Encode a record.
    ///
    /// # Errors
    ///
    /// - `RecordTooLarge` if key + payload exceed `max_record_bytes`. The
    ///   record must not be submitted.
    /// - `Serialization` if the record cannot be represented as JSON.
    pub fn encode<R: Serialize>(&self, record: &R) -> Result<EncodedRecord> {
        let value = serde_json::to_value(record)?;
        let payload = serde_json::to_vec(&value)?;
        let partition_key = self.strategy.derive(&value, &payload);

        let size = partition_key.len() + payload.len();
        if size > self.max_record_bytes {
            return Err(Error::RecordTooLarge {
                partition_key,
                size,
                limit: self.max_record_bytes,
            });
        }

        Ok(EncodedRecord::new(partition_key, Bytes::from(payload)))
    }
}
