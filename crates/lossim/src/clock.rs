//! Delay primitive used to pace request generation and simulate service time.

use std::time::Duration;

use async_trait::async_trait;

/// Source of blocking delays.
///
/// Both the generator (inter-arrival spacing) and the worker tasks (service
/// duration) suspend only through this trait, so tests can substitute a clock
/// that records or skips delays.
#[async_trait]
pub trait Clock: Send + Sync + 'static {
    /// Suspend the calling task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer.
///
/// Under `#[tokio::test(start_paused = true)]` this behaves as a mock clock:
/// time only advances when every task is idle.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
