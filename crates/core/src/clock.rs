//! Injectable time source.
//!
//! Every sleep and deadline in the crate goes through [`Clock`] so that the
//! retry and polling machinery can run under simulated time in tests.

use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Time source abstraction for backoff, polling, and deadlines.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current monotonic instant.
    fn now(&self) -> Instant;

    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Real time via the tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
