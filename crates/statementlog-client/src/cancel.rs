//! Caller-side cancellation for writes.
//!
//! A [`CancelHandle`] is a cheap, clonable flag backed by a `watch` channel.
//! The writer checks it before each submission and races it against every
//! in-flight submission and backoff sleep, so a cancelled write returns
//! promptly with the undelivered records marked `Cancelled`.
//!
//! ```ignore
//! let cancel = CancelHandle::new();
//! let worker = {
//!     let cancel = cancel.clone();
//!     tokio::spawn(async move { writer.write_with_cancel(&records, &cancel).await })
//! };
//! cancel.cancel();
//! let result = worker.await??;
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Cancel after `delay`, from a background task.
    pub fn cancel_after(&self, delay: Duration) -> tokio::task::JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            handle.cancel();
        })
    }

    /// Completes once cancellation has been requested.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                // Sender is owned by `self`, so this only happens during teardown
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}
