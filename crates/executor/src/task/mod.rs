//! Task abstractions
//!
//! Tasks are units of fire-and-forget work. They:
//! - Carry an operation name and an immutable argument snapshot
//! - Run an opaque body that may fail with a typed [`TaskError`]
//! - Are tracked attempt by attempt when retried

mod attempt;
mod definition;

pub use attempt::{Attempt, AttemptOutcome, TaskPhase};
pub use definition::{task_body, Args, Task, TaskBody, TaskError, TaskFuture, PANIC_ERROR_TYPE};
