//! Stream Provisioning
//!
//! Makes sure the target stream exists and is `Active` before the first
//! record is sent.
//!
//! ## Design
//!
//! ```text
//! ensure_ready()
//!   │
//!   ├─ cached ready? ──────────────→ Ok (no provider calls)
//!   │
//!   └─ lock ─→ describe ─┬─ Active ────────────→ cache ready, Ok
//!                        ├─ Absent ────────────→ create once, poll
//!                        ├─ Creating/Updating ─→ poll every poll_interval
//!                        └─ Deleting/Unknown ──→ StreamUnavailable
//!                                 │
//!                                 └─ deadline passed → StreamUnavailable
//! ```
//!
//! ## Thread Safety
//!
//! Concurrent callers are serialized on a `tokio::sync::Mutex`, so at most
//! one provisioning sequence runs at a time and at most one create request is
//! issued per sequence. Callers that waited behind a failed sequence get that
//! failure instead of starting another one. A failure is not cached: the next
//! call after it provisions again.

use crate::error::{ClientError, Result};
use crate::provider::{codes, StreamProvider, StreamState};
use statementlog_observability::metrics;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

/// Default wait between `describe` calls while the stream is transitioning.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default bound on one provisioning sequence.
pub const DEFAULT_PROVISION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Default)]
struct Readiness {
    /// Completed provisioning sequences, successful or not
    sequences: u64,
    last_error: Option<String>,
}

/// Single-flight guard around stream creation.
pub struct StreamProvisioner {
    provider: Arc<dyn StreamProvider>,
    stream: String,
    shard_count: u32,
    poll_interval: Duration,
    timeout: Duration,
    ready: AtomicBool,
    sequences: AtomicU64,
    state: Mutex<Readiness>,
}

impl StreamProvisioner {
    pub fn new(
        provider: Arc<dyn StreamProvider>,
        stream: impl Into<String>,
        shard_count: u32,
    ) -> Self {
        Self {
            provider,
            stream: stream.into(),
            shard_count: shard_count.max(1),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_PROVISION_TIMEOUT,
            ready: AtomicBool::new(false),
            sequences: AtomicU64::new(0),
            state: Mutex::new(Readiness::default()),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Whether a previous call already observed the stream `Active`.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Resolve once the stream is `Active`.
    ///
    /// Idempotent: after the first success no provider calls are made.
    ///
    /// # Errors
    ///
    /// `StreamUnavailable` when the stream cannot become `Active` before the
    /// timeout, is being deleted, or the provider refuses a describe/create.
    pub async fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }

        let observed = self.sequences.load(Ordering::Acquire);
        let mut state = self.state.lock().await;

        if self.is_ready() {
            return Ok(());
        }

        // Another caller finished a sequence while we waited on the lock
        if state.sequences > observed {
            if let Some(reason) = &state.last_error {
                return Err(self.unavailable(reason.clone()));
            }
        }

        // Bounds stalled provider calls too, not only the waits between polls
        let outcome = match timeout(self.timeout, self.provision()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(self.timeout_reason()),
        };
        state.sequences += 1;
        self.sequences.store(state.sequences, Ordering::Release);

        match outcome {
            Ok(created) => {
                state.last_error = None;
                self.ready.store(true, Ordering::Release);
                let result = if created { "created" } else { "ready" };
                metrics::record_provision(&self.stream, result);
                info!(stream = %self.stream, created, "Stream is active");
                Ok(())
            }
            Err(reason) => {
                warn!(stream = %self.stream, reason = %reason, "Stream provisioning failed");
                metrics::record_provision(&self.stream, "unavailable");
                state.last_error = Some(reason.clone());
                Err(self.unavailable(reason))
            }
        }
    }

    /// One provisioning sequence. Returns whether this sequence created the
    /// stream, or the reason it is unavailable.
    async fn provision(&self) -> std::result::Result<bool, String> {
        let deadline = Instant::now() + self.timeout;
        let mut created = false;

        loop {
            match self.provider.describe_stream(&self.stream).await {
                Ok(StreamState::Active) => return Ok(created),
                Ok(StreamState::Absent) if !created => {
                    match self.provider.create_stream(&self.stream, self.shard_count).await {
                        Ok(()) => {
                            info!(
                                stream = %self.stream,
                                shard_count = self.shard_count,
                                "Created stream"
                            );
                            created = true;
                        }
                        Err(e) if e.code == codes::RESOURCE_IN_USE => {
                            debug!(stream = %self.stream, "Stream created concurrently");
                            created = true;
                        }
                        Err(e) if codes::is_transient(&e.code) => {
                            warn!(
                                stream = %self.stream,
                                error = %e,
                                "Create stream failed, will retry"
                            );
                        }
                        Err(e) => return Err(format!("create failed: {}", e)),
                    }
                }
                Ok(
                    state @ (StreamState::Absent | StreamState::Creating | StreamState::Updating),
                ) => {
                    debug!(stream = %self.stream, state = %state, "Waiting for stream");
                }
                Ok(state) => return Err(format!("stream is {}", state)),
                Err(e) if codes::is_transient(&e.code) => {
                    warn!(stream = %self.stream, error = %e, "Describe stream failed, will retry");
                }
                Err(e) => return Err(format!("describe failed: {}", e)),
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.timeout_reason());
            }
            sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    fn timeout_reason(&self) -> String {
        format!("not active after {}ms", self.timeout.as_millis())
    }

    fn unavailable(&self, reason: String) -> ClientError {
        ClientError::StreamUnavailable {
            stream: self.stream.clone(),
            reason,
        }
    }
}
