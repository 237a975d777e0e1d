//! lossim: admission-controlled worker pool simulating an Erlang-B loss system.
//!
//! A generator emits requests at a fixed rate into a pool of `N` channels.
//! Each request either claims a free channel for a fixed service time or is
//! dropped. After the run, observed counts are reported next to the
//! closed-form Erlang-B predictions.

pub mod admission;
pub mod clock;
pub mod config;
pub mod generator;
pub mod model;
pub mod report;
pub mod simulation;

pub use admission::{AdmissionOutcome, PoolError, PoolSnapshot, RequestId, SlotId, WorkerPool};
pub use clock::{Clock, TokioClock};
pub use config::{ConfigError, SimulationConfig};
pub use generator::{GenerationSummary, RequestGenerator, RequestHandler};
pub use model::{AnalyticResult, ErlangB, ModelError};
pub use report::SimulationReport;
pub use simulation::{Simulation, SimulationError};
