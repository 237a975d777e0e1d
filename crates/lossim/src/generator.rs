//! Request generator - a bounded, evenly paced stream of requests.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::admission::{AdmissionOutcome, RequestId, WorkerPool};
use crate::clock::Clock;

/// Consumer of generated requests.
///
/// Submission is fire-and-forget: the handler decides admission synchronously
/// and must not wait for the request to be served.
pub trait RequestHandler: Send + Sync {
    fn submit(&self, request: RequestId) -> AdmissionOutcome;
}

impl RequestHandler for WorkerPool {
    fn submit(&self, request: RequestId) -> AdmissionOutcome {
        WorkerPool::submit(self, request)
    }
}

/// What the generator saw of its own submissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GenerationSummary {
    pub submitted: u64,
    pub accepted: u64,
    pub rejected: u64,
}

impl GenerationSummary {
    fn record(&mut self, outcome: AdmissionOutcome) {
        self.submitted += 1;
        if outcome.is_accepted() {
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
    }
}

pub struct RequestGenerator {
    total_requests: u64,
    interval: Duration,
    clock: Arc<dyn Clock>,
}

impl RequestGenerator {
    pub fn new(total_requests: u64, interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            total_requests,
            interval,
            clock,
        }
    }

    /// Submit requests `1..=total_requests`, pausing `interval` after each.
    ///
    /// Returns early with a partial summary if `cancel` fires.
    pub async fn run<H>(&self, handler: &H, cancel: &CancellationToken) -> GenerationSummary
    where
        H: RequestHandler + ?Sized,
    {
        let mut summary = GenerationSummary::default();

        for id in 1..=self.total_requests {
            if cancel.is_cancelled() {
                break;
            }

            let request = RequestId::new(id);
            tracing::trace!(%request, "Submitting request");
            summary.record(handler.submit(request));

            tokio::select! {
                _ = self.clock.sleep(self.interval) => {}
                _ = cancel.cancelled() => {
                    tracing::info!(submitted = summary.submitted, "Generation cancelled");
                    break;
                }
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    /// Clock that records requested delays and returns immediately.
    #[derive(Default)]
    struct RecordingClock {
        sleeps: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Clock for RecordingClock {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    /// Handler that accepts every other request and remembers the ids.
    #[derive(Default)]
    struct AlternatingHandler {
        seen: Mutex<Vec<u64>>,
    }

    impl RequestHandler for AlternatingHandler {
        fn submit(&self, request: RequestId) -> AdmissionOutcome {
            self.seen.lock().unwrap().push(request.get());
            if request.get() % 2 == 1 {
                AdmissionOutcome::Accepted {
                    slot: crate::admission::SlotId::new(0),
                }
            } else {
                AdmissionOutcome::Rejected
            }
        }
    }

    #[tokio::test]
    async fn submits_sequential_ids_with_fixed_pacing() {
        let clock = Arc::new(RecordingClock::default());
        let generator = RequestGenerator::new(5, Duration::from_millis(100), clock.clone());
        let handler = AlternatingHandler::default();

        let summary = generator.run(&handler, &CancellationToken::new()).await;

        assert_eq!(*handler.seen.lock().unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(
            summary,
            GenerationSummary {
                submitted: 5,
                accepted: 3,
                rejected: 2,
            }
        );
        assert_eq!(
            *clock.sleeps.lock().unwrap(),
            vec![Duration::from_millis(100); 5]
        );
    }

    #[tokio::test]
    async fn cancelled_before_start_submits_nothing() {
        let generator = RequestGenerator::new(
            10,
            Duration::from_millis(100),
            Arc::new(RecordingClock::default()),
        );
        let handler = AlternatingHandler::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = generator.run(&handler, &cancel).await;

        assert_eq!(summary, GenerationSummary::default());
        assert!(handler.seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_generation_midway() {
        let generator = RequestGenerator::new(
            100,
            Duration::from_millis(100),
            Arc::new(crate::clock::TokioClock),
        );
        let handler = AlternatingHandler::default();
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(250)).await;
                cancel.cancel();
            })
        };

        let summary = generator.run(&handler, &cancel).await;
        canceller.await.unwrap();

        // submissions at t=0, 100, 200
        assert_eq!(summary.submitted, 3);
        assert_eq!(*handler.seen.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn drives_worker_pool() {
        let clock: Arc<dyn Clock> = Arc::new(crate::clock::TokioClock);
        let pool = WorkerPool::new(2, Duration::from_millis(250), clock.clone()).unwrap();
        let generator = RequestGenerator::new(6, Duration::from_millis(100), clock);

        let summary = generator.run(&pool, &CancellationToken::new()).await;

        // t=0 slot 0, t=100 slot 1, t=200 rejected, t=300 slot 0 (free since 250),
        // t=400 slot 1 (free since 350), t=500 rejected
        let snapshot = pool.snapshot();
        assert_eq!(
            summary,
            GenerationSummary {
                submitted: 6,
                accepted: 4,
                rejected: 2,
            }
        );
        assert_eq!(summary.accepted, snapshot.processed_count);
        assert_eq!(summary.rejected, snapshot.rejected_count);
        assert_eq!(snapshot.request_count, 6);
        assert!(snapshot.is_consistent());
        assert!(snapshot.peak_busy <= 2);
    }
}
