//! Cancellation handle bounding an in-flight upgrade.
//!
//! Every [`Image`](super::Image) owns one scope. Clones share the same
//! cancellation token, so a worker holding a clone observes a cancel issued
//! through the aggregate (or through the in-flight registry) and vice versa.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct ExecutionScope {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl ExecutionScope {
    /// Scope that only ends when cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope that also ends once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }

    /// Resolves once the scope is cancelled or its deadline passes.
    pub async fn done(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}
