//! Admission control over a fixed set of channels.
//!
//! Every incoming request either claims the first free slot and runs on its own
//! worker task, or is rejected on the spot. There is no waiting room.
//!
//! - `submit`: scan + counter update + slot claim + worker spawn, one critical section
//! - worker completion: slot release, same lock
//! - `shutdown`: cancel in-flight workers and join them

mod pool;
mod slot;

use std::fmt;

use serde::Serialize;

pub use pool::{PoolError, PoolSnapshot, WorkerPool};
pub use slot::SlotId;

/// Sequential request identifier, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of one admission decision. Rejection is an expected outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionOutcome {
    Accepted { slot: SlotId },
    Rejected,
}

impl AdmissionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn slot(&self) -> Option<SlotId> {
        match self {
            Self::Accepted { slot } => Some(*slot),
            Self::Rejected => None,
        }
    }
}
