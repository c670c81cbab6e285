//! Uncaught failure reporting
//!
//! Any failure that escapes a job (a plain task body error, a recovery
//! handler error, a panic) is handed to a [`FailureReporter`]. The reporter
//! is passed to the pool explicitly rather than reached through global state.

use chrono::{DateTime, Utc};
use tracing::error;

use crate::error::TaskFailure;
use crate::task::Args;

/// A failure nobody else handled
#[derive(Debug, Clone)]
pub struct UncaughtFailure {
    /// Operation that failed
    pub operation: String,

    /// Arguments the operation was invoked with
    pub args: Args,

    /// What went wrong
    pub failure: TaskFailure,

    /// Worker that observed the failure (None when run on the caller)
    pub worker: Option<String>,

    /// When the failure was observed
    pub occurred_at: DateTime<Utc>,
}

impl UncaughtFailure {
    /// Create a new report entry
    pub fn new(operation: impl Into<String>, args: Args, failure: TaskFailure) -> Self {
        Self {
            operation: operation.into(),
            args,
            failure,
            worker: None,
            occurred_at: Utc::now(),
        }
    }

    /// Record the worker that observed the failure
    pub fn on_worker(mut self, worker: Option<&str>) -> Self {
        self.worker = worker.map(str::to_string);
        self
    }

    /// Arguments rendered as a JSON array
    pub fn args_json(&self) -> String {
        serde_json::to_string(&self.args[..]).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Sink for uncaught task failures
///
/// Implementations must not block: they are called from worker tasks.
pub trait FailureReporter: Send + Sync {
    fn report(&self, failure: UncaughtFailure);
}

/// Default reporter: one structured `error!` event per failure
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl FailureReporter for TracingReporter {
    fn report(&self, failure: UncaughtFailure) {
        error!(
            operation = %failure.operation,
            args = %failure.args_json(),
            kind = failure.failure.kind(),
            worker = failure.worker.as_deref().unwrap_or("caller"),
            "Exception in async task: {}",
            failure.failure
        );
    }
}
