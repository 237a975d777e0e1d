//! Slot - one fixed channel of the pool and the worker task bound to it.

use std::fmt;

use serde::Serialize;
use tokio::task::JoinHandle;

use super::RequestId;

/// Position of a slot in the pool, `0..channel_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SlotId(usize);

impl SlotId {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A channel. `Free -> Busy` on assignment, `Busy -> Free` on release.
///
/// Only touched under the pool lock.
#[derive(Debug, Default)]
pub(crate) struct Slot {
    in_use: bool,
    request: Option<RequestId>,
    worker: Option<JoinHandle<()>>,
}

impl Slot {
    pub fn is_free(&self) -> bool {
        !self.in_use
    }

    pub fn request(&self) -> Option<RequestId> {
        self.request
    }

    /// Mark busy and bind the worker serving `request`.
    pub fn assign(&mut self, request: RequestId, worker: JoinHandle<()>) {
        debug_assert!(!self.in_use, "assigned a busy slot");
        self.in_use = true;
        self.request = Some(request);
        self.worker = Some(worker);
    }

    /// Mark free. Returns the request that was being served, if any.
    ///
    /// The worker handle is dropped, which detaches the (finishing) task.
    pub fn release(&mut self) -> Option<RequestId> {
        self.in_use = false;
        self.worker = None;
        self.request.take()
    }

    /// Take the worker handle so it can be joined outside the lock.
    /// The slot stays busy until the worker releases it.
    pub fn take_worker(&mut self) -> Option<JoinHandle<()>> {
        self.worker.take()
    }
}
