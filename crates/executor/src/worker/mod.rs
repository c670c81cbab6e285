//! Bounded worker pool
//!
//! Jobs are placed with a worker, queued or rejected according to the pool
//! configuration. Workers are tokio tasks; idle workers above the core size
//! exit after the keep-alive elapses.

mod job;
mod pool;
mod rejection;

pub use job::Job;
pub use pool::{PoolStats, PoolStatus, ShutdownOutcome, WorkerPool};
pub use rejection::{RejectionAction, RejectionContext, RejectionHandler, RejectionPolicy};
