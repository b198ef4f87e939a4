//! statementlog Client - Reliable Batched Stream Writer
//!
//! This crate writes records to a partitioned, append-only stream. It
//! provisions the stream on first use, packs records into provider-sized
//! batches, submits batches concurrently, and retries transient per-record
//! failures with exponential backoff.
//!
//! # Examples
//!
//! ## Writing statements
//!
//! ```ignore
//! use statementlog_client::{MemoryStreamProvider, StreamWriter};
//! use statementlog_core::Statement;
//!
//! let writer = StreamWriter::builder()
//!     .provider(Arc::new(MemoryStreamProvider::new()))
//!     .stream_name("statements")
//!     .build()?;
//!
//! let statements = vec![Statement::new("b10011745", "dcterms:identifier", 10004, "10011745")];
//! let result = writer.write(&statements).await?;
//! assert!(result.is_complete());
//! ```
//!
//! ## Configuration from the environment
//!
//! ```ignore
//! use statementlog_client::{StreamWriter, WriterConfig};
//! use statementlog_client::kinesis::KinesisProvider;
//!
//! let writer = StreamWriter::builder()
//!     .provider(Arc::new(KinesisProvider::from_env().await))
//!     .config(WriterConfig::from_env()?)
//!     .build()?;
//! ```
//!
//! ## Cancellation
//!
//! ```ignore
//! let result = writer.write_with_timeout(&statements, Duration::from_secs(5)).await?;
//! println!("{} cancelled", result.cancelled());
//! ```

pub mod batch;
pub mod cancel;
pub mod config;
pub mod credentials;
pub mod error;
#[cfg(feature = "kinesis")]
pub mod kinesis;
pub mod memory;
pub mod provider;
pub mod provisioner;
pub mod result;
pub mod retry;
pub mod writer;

pub use batch::{Batch, BatchEntry, RecordBatcher};
pub use cancel::CancelHandle;
pub use config::WriterConfig;
pub use credentials::{CredentialResolver, EnvCredentialResolver};
pub use error::{ClientError, Result};
pub use memory::{MemoryStreamProvider, StoredRecord};
pub use provider::{ProviderError, StreamProvider, StreamState, SubmissionOutcome};
pub use provisioner::StreamProvisioner;
pub use result::{FailureReason, RecordFailure, RecordReceipt, WriteResult};
pub use retry::{RetryCoordinator, RetryPolicy};
pub use writer::{StreamWriter, StreamWriterBuilder};
