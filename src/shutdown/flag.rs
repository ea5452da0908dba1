//! Process-wide "stopping" state.

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// One-way stopping flag shared by the capture loop, the shutdown
/// coordinator and the throughput reporter.
///
/// Once triggered it never reverts. Triggering happens-before any
/// `is_stopping()` call that observes `true`, and wakes every `stopped()`
/// waiter.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    token: CancellationToken,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_stopping(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the flag has been triggered.
    pub fn stopped(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}
