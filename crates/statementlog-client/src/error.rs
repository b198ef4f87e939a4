//! Error types for statementlog client operations.
//!
//! Only errors that abort a whole call live here. Problems with a single
//! record (too large, rejected by the provider, retries exhausted, cancelled)
//! are reported inside [`WriteResult`](crate::WriteResult) instead, so one bad
//! record never costs the caller the rest of the write.
//!
//! ## Error Categories
//!
//! - **Stream**: `StreamUnavailable` (stream could not be made writable)
//! - **Configuration**: `ConfigError`
//! - **Collaborators**: `MissingCredential`
//!
//! Provider errors never surface directly: during a write they become
//! per-record outcomes, during provisioning they become `StreamUnavailable`.

use thiserror::Error;

/// Convenience type alias for `Result<T, ClientError>`.
pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The stream could not reach the `Active` state.
    ///
    /// ## Causes
    /// - Provisioning timed out while the stream was `Creating`/`Updating`
    /// - The stream is `Deleting` or in an unknown state
    /// - The provider refused to describe or create the stream
    ///
    /// ## Resolution
    /// - The next write re-attempts provisioning from scratch
    /// - Check the stream in the provider console if it keeps failing
    #[error("Stream '{stream}' is unavailable: {reason}")]
    StreamUnavailable { stream: String, reason: String },

    /// Invalid writer configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A required credential is not set.
    #[error("Missing {0} env variable; aborting.")]
    MissingCredential(String),
}
