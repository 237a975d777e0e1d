//! Worker pool: slot table, counters and the admission/release protocol.
//!
//! All shared state lives in one `PoolState` behind a std mutex. Critical
//! sections never await: `submit` spawns the worker while holding the lock, so
//! the worker cannot release its slot before the slot records it.
//!
//! A worker that dies without releasing its slot (panic, or the task being
//! torn down) trips the pool's `failed` token. The slot stays claimed until
//! `shutdown` joins the worker and reports the failure.

use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::slot::{Slot, SlotId};
use super::{AdmissionOutcome, RequestId};
use crate::clock::Clock;
use crate::config::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("worker on slot {slot} panicked")]
    WorkerPanicked { slot: SlotId },
    #[error("worker on slot {slot} was torn down before it finished")]
    WorkerAborted { slot: SlotId },
}

/// Consistent view of the pool counters, read under the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub channel_count: usize,
    /// Requests seen by `submit`.
    pub request_count: u64,
    /// Requests admitted to a slot.
    pub processed_count: u64,
    /// Requests turned away because every slot was busy.
    pub rejected_count: u64,
    /// Slots busy right now.
    pub busy: usize,
    /// Most slots ever busy at the same instant.
    pub peak_busy: usize,
}

impl PoolSnapshot {
    /// `request_count == processed_count + rejected_count` and no over-subscription.
    pub fn is_consistent(&self) -> bool {
        self.request_count == self.processed_count + self.rejected_count
            && self.busy <= self.peak_busy
            && self.peak_busy <= self.channel_count
    }
}

#[derive(Debug)]
struct PoolState {
    slots: Vec<Slot>,
    request_count: u64,
    processed_count: u64,
    rejected_count: u64,
    busy: usize,
    peak_busy: usize,
}

struct PoolShared {
    state: StdMutex<PoolState>,
    released: Notify,
    cancel: CancellationToken,
    failed: CancellationToken,
    clock: Arc<dyn Clock>,
    service_time: Duration,
}

impl PoolShared {
    /// Lock the pool state. A poisoned lock is recovered: every mutation under
    /// it is a handful of field writes, so the state is still usable.
    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Pool mutex poisoned - recovering state");
                poisoned.into_inner()
            }
        }
    }

    fn release(&self, slot: SlotId, completed: bool) {
        let mut guard = self.lock_state();
        let state = &mut *guard;

        let request = state.slots[slot.index()].release();
        state.busy -= 1;
        let busy = state.busy;
        drop(guard);

        if completed {
            tracing::debug!(%slot, request = ?request.map(|r| r.get()), busy, "Request served - slot free");
        } else {
            tracing::debug!(%slot, request = ?request.map(|r| r.get()), busy, "Worker cancelled - slot free");
        }
        self.released.notify_waiters();
    }
}

/// Armed while a worker holds its slot. Dropped armed means the worker never
/// reached `release`.
struct WorkerGuard<'a> {
    shared: &'a PoolShared,
    slot: SlotId,
    request: RequestId,
    armed: bool,
}

impl WorkerGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for WorkerGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let (slot, request) = (self.slot, self.request);
        if std::thread::panicking() {
            tracing::error!(%slot, %request, "Worker panicked - failing the run");
        } else {
            tracing::error!(%slot, %request, "Worker dropped before release - failing the run");
        }
        self.shared.failed.cancel();
    }
}

/// Worker task body: hold the slot for the service time, then free it.
async fn run(shared: Arc<PoolShared>, slot: SlotId, request: RequestId) {
    tracing::trace!(%slot, %request, "Processing request");

    let mut guard = WorkerGuard {
        shared: &shared,
        slot,
        request,
        armed: true,
    };

    let completed = tokio::select! {
        _ = shared.clock.sleep(shared.service_time) => true,
        _ = shared.cancel.cancelled() => false,
    };

    guard.disarm();
    shared.release(slot, completed);
}

/// Fixed-capacity pool of channels.
///
/// Must be used from within a tokio runtime: admitted requests are served on
/// spawned tasks.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    channel_count: usize,
}

impl WorkerPool {
    pub fn new(
        channel_count: usize,
        service_time: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        if channel_count == 0 {
            return Err(ConfigError::NoChannels);
        }

        let slots = (0..channel_count).map(|_| Slot::default()).collect();

        Ok(Self {
            shared: Arc::new(PoolShared {
                state: StdMutex::new(PoolState {
                    slots,
                    request_count: 0,
                    processed_count: 0,
                    rejected_count: 0,
                    busy: 0,
                    peak_busy: 0,
                }),
                released: Notify::new(),
                cancel: CancellationToken::new(),
                failed: CancellationToken::new(),
                clock,
                service_time,
            }),
            channel_count,
        })
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Admit `request` onto the first free slot (index order), or reject it.
    pub fn submit(&self, request: RequestId) -> AdmissionOutcome {
        let mut guard = self.shared.lock_state();
        let state = &mut *guard;

        state.request_count += 1;

        let Some(index) = state.slots.iter().position(Slot::is_free) else {
            state.rejected_count += 1;
            tracing::debug!(%request, busy = state.busy, "All slots busy - request rejected");
            return AdmissionOutcome::Rejected;
        };

        let slot = SlotId::new(index);
        let worker = tokio::spawn(run(Arc::clone(&self.shared), slot, request));
        state.slots[index].assign(request, worker);

        state.processed_count += 1;
        state.busy += 1;
        state.peak_busy = state.peak_busy.max(state.busy);

        debug_assert_eq!(
            state.request_count,
            state.processed_count + state.rejected_count
        );
        tracing::debug!(%request, %slot, busy = state.busy, "Request admitted");

        AdmissionOutcome::Accepted { slot }
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let state = self.shared.lock_state();
        PoolSnapshot {
            channel_count: self.channel_count,
            request_count: state.request_count,
            processed_count: state.processed_count,
            rejected_count: state.rejected_count,
            busy: state.busy,
            peak_busy: state.peak_busy,
        }
    }

    /// Resolve once no slot is busy.
    pub async fn wait_idle(&self) {
        loop {
            let mut notified = std::pin::pin!(self.shared.released.notified());
            notified.as_mut().enable();

            if self.shared.lock_state().busy == 0 {
                return;
            }

            notified.await;
        }
    }

    /// Resolve once a worker has died without releasing its slot.
    ///
    /// The run cannot continue after that: `shutdown` returns the error.
    pub async fn failed(&self) {
        self.shared.failed.cancelled().await
    }

    pub fn has_failed(&self) -> bool {
        self.shared.failed.is_cancelled()
    }

    /// Cancel in-flight workers, join them, and return the final counters.
    ///
    /// A worker that panicked is fatal for the run and surfaces as an error.
    pub async fn shutdown(self) -> Result<PoolSnapshot, PoolError> {
        self.shared.cancel.cancel();

        let workers: Vec<_> = {
            let mut state = self.shared.lock_state();
            state
                .slots
                .iter_mut()
                .enumerate()
                .filter_map(|(index, slot)| {
                    let request = slot.request();
                    slot.take_worker()
                        .map(|worker| (SlotId::new(index), request, worker))
                })
                .collect()
        };

        if !workers.is_empty() {
            tracing::warn!(in_flight = workers.len(), "Cancelling in-flight workers");
        }

        let mut failure = None;
        for (slot, request, worker) in workers {
            match worker.await {
                Ok(()) => {}
                Err(e) if e.is_panic() => {
                    tracing::error!(%slot, request = ?request.map(|r| r.get()), "Worker panicked");
                    failure.get_or_insert(PoolError::WorkerPanicked { slot });
                }
                Err(_) => {
                    tracing::error!(%slot, request = ?request.map(|r| r.get()), "Worker aborted");
                    failure.get_or_insert(PoolError::WorkerAborted { slot });
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(self.snapshot()),
        }
    }
}
