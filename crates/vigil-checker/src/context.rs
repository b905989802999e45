//! Cancellation and deadline propagation for one check run.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use vigil_core::CheckError;

/// Cancellation signal plus optional deadline, threaded through every
/// suspension point of a run.
///
/// Cloning is cheap; clones observe the same cancellation signal.
#[derive(Debug, Clone)]
pub struct RunContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RunContext {
    /// Context with no deadline that only ends on explicit cancel.
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Context that ends at the given instant.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            cancel: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Context that ends after the given duration.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Signal cancellation to every clone of this context.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once the context has been cancelled or its deadline passed.
    pub fn is_done(&self) -> bool {
        if self.cancel.is_cancelled() {
            return true;
        }
        match self.deadline {
            Some(d) => Instant::now() >= d,
            None => false,
        }
    }

    /// Resolve when the context ends. Pends forever on a context with
    /// no deadline that is never cancelled.
    pub async fn done(&self) {
        match self.deadline {
            Some(d) => tokio::select! {
                _ = self.cancel.cancelled() => {}
                _ = tokio::time::sleep_until(d) => {}
            },
            None => self.cancel.cancelled().await,
        }
    }

    /// The error describing why the context ended. Only meaningful
    /// once [`is_done`](Self::is_done) is true.
    pub fn cause(&self) -> CheckError {
        if self.cancel.is_cancelled() {
            CheckError::Cancelled("run context cancelled".to_owned())
        } else {
            CheckError::Timeout("run deadline exceeded".to_owned())
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-run execution options, kept separate from the cancellation
/// signal so configuration never rides on the context as untyped state.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Fan-out cap: dispatch at most this many resolved targets.
    pub max_hosts: Option<usize>,
}
