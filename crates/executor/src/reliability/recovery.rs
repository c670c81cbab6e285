//! Recovery handlers
//!
//! A recovery handler runs exactly once per task whose retries are exhausted
//! or whose failure is not retryable. It performs observability or
//! compensating work only; an error it returns is reported as an uncaught
//! failure and never retried.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

use crate::error::TaskFailure;
use crate::task::{Args, TaskError};

/// Why a task ended up in recovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// Every attempt failed with a retryable error
    RetriesExhausted,
    /// An attempt failed with an error the policy refuses to retry
    NonRetryable,
    /// A retry could not be resubmitted (pool saturated or shut down)
    Rejected,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::RetriesExhausted => write!(f, "retries exhausted"),
            FailureCause::NonRetryable => write!(f, "non-retryable failure"),
            FailureCause::Rejected => write!(f, "retry rejected"),
        }
    }
}

/// Terminal failure handed to a recovery handler
#[derive(Debug, Clone)]
pub struct TerminalFailure {
    /// Task instance that failed
    pub task_id: Uuid,

    /// Operation identifier
    pub operation: String,

    /// Original arguments
    pub args: Args,

    /// Failure of the last attempt
    pub error: TaskError,

    /// Attempts made, including the last one
    pub attempts: u32,

    /// How the task reached recovery
    pub cause: FailureCause,
}

impl TerminalFailure {
    /// The failure in the executor's error taxonomy
    pub fn to_task_failure(&self) -> TaskFailure {
        match self.cause {
            FailureCause::RetriesExhausted => TaskFailure::RetriesExhausted {
                attempts: self.attempts,
                last: self.error.clone(),
            },
            FailureCause::NonRetryable => TaskFailure::NonRetryable(self.error.clone()),
            FailureCause::Rejected => TaskFailure::Retryable(self.error.clone()),
        }
    }
}

/// Per-operation callback for tasks that will not be attempted again
///
/// # Example
///
/// ```ignore
/// struct RestockAlert { ops: OpsClient }
///
/// #[async_trait]
/// impl RecoveryHandler for RestockAlert {
///     async fn on_exhausted(&self, failure: &TerminalFailure) -> anyhow::Result<()> {
///         self.ops.page(&failure.operation, &failure.error.message).await
///     }
/// }
/// ```
#[async_trait]
pub trait RecoveryHandler: Send + Sync {
    async fn on_exhausted(&self, failure: &TerminalFailure) -> anyhow::Result<()>;
}

/// Recovery that only logs the terminal failure
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingRecovery;

#[async_trait]
impl RecoveryHandler for LoggingRecovery {
    async fn on_exhausted(&self, failure: &TerminalFailure) -> anyhow::Result<()> {
        error!(
            task_id = %failure.task_id,
            operation = %failure.operation,
            attempts = failure.attempts,
            cause = %failure.cause,
            error = %failure.to_task_failure(),
            "Failed to run {} after {} attempts",
            failure.operation,
            failure.attempts
        );
        Ok(())
    }
}

/// Recovery handler backed by a closure
pub struct RecoveryFn<F>(F);

/// Wrap an async closure as a [`RecoveryHandler`]
///
/// The closure receives an owned copy of the terminal failure.
pub fn recovery_fn<F, Fut>(f: F) -> RecoveryFn<F>
where
    F: Fn(TerminalFailure) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    RecoveryFn(f)
}

#[async_trait]
impl<F, Fut> RecoveryHandler for RecoveryFn<F>
where
    F: Fn(TerminalFailure) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn on_exhausted(&self, failure: &TerminalFailure) -> anyhow::Result<()> {
        (self.0)(failure.clone()).await
    }
}
