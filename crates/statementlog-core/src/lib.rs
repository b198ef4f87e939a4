//! statementlog core types
//!
//! The domain record ([`Statement`]) and the encoding that turns any
//! serializable record into an [`EncodedRecord`] for the stream provider.

pub mod encoding;
pub mod error;
pub mod statement;

pub use encoding::{
    EncodedRecord, PartitionKeyStrategy, RecordEncoder, DEFAULT_MAX_RECORD_BYTES,
    MAX_PARTITION_KEY_BYTES,
};
pub use error::{Error, Result};
pub use statement::Statement;
