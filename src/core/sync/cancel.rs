//! Run cancellation
//!
//! Every suspension point of a run is raced against the shutdown signal and
//! the run deadline. Whichever fires first turns the pending operation into a
//! `Cancelled` or `Timeout` error.

use crate::domain::{Result, SyncError};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Shutdown signal plus optional deadline for one run
#[derive(Debug, Clone)]
pub struct RunGuard {
    shutdown: watch::Receiver<bool>,
    deadline: Option<Instant>,
}

impl RunGuard {
    /// Creates a guard; the deadline starts counting now
    pub fn new(shutdown: watch::Receiver<bool>, timeout: Option<Duration>) -> Self {
        Self {
            shutdown,
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    /// True once shutdown has been requested
    pub fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Runs `fut` unless shutdown or the deadline comes first
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Cancelled(op)` on shutdown, `SyncError::Timeout(op)`
    /// past the deadline, or whatever `fut` itself returns.
    pub async fn guard<T, F>(&self, op: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(SyncError::Cancelled(op.to_string()));
        }

        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => Err(SyncError::Cancelled(op.to_string())),
            _ = wait_for_deadline(self.deadline) => Err(SyncError::Timeout(op.to_string())),
            result = fut => result,
        }
    }
}

async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        // Sender gone: shutdown can no longer be requested
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
