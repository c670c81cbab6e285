//! Error types for the executor
//!
//! Submission errors surface synchronously to callers. Everything that goes
//! wrong after a task was accepted is a [`TaskFailure`] and only ever reaches
//! the [`FailureReporter`](crate::report::FailureReporter).

use thiserror::Error;

use crate::task::TaskError;

/// Errors returned to the submitter of a task
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Pool saturated and the rejection policy is `abort`
    #[error("task '{operation}' rejected: pool saturated ({active} active, {queued} queued)")]
    SubmissionRejected {
        operation: String,
        active: usize,
        queued: usize,
    },

    /// Pool saturated and the task was dropped (discard or discard-oldest)
    ///
    /// Never returned from `submit`; handed to a job's drop hook.
    #[error("task '{operation}' discarded: pool saturated")]
    Discarded { operation: String },

    /// The executor no longer accepts work
    #[error("executor is shut down")]
    ShutDown,

    /// Configuration violates a sizing invariant
    #[error("invalid executor configuration: {0}")]
    InvalidConfig(String),
}

impl ExecutorError {
    /// Create an invalid configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        ExecutorError::InvalidConfig(msg.into())
    }

    /// Whether this is a saturation rejection (as opposed to shutdown)
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ExecutorError::SubmissionRejected { .. } | ExecutorError::Discarded { .. }
        )
    }
}

/// Terminal failure of an accepted task
///
/// Never propagated to the original caller, who has already returned.
#[derive(Debug, Clone, Error)]
pub enum TaskFailure {
    /// Body failed with an error the retry predicate accepts
    #[error("retryable failure: {0}")]
    Retryable(TaskError),

    /// Body failed with an error the retry predicate refuses
    #[error("non-retryable failure: {0}")]
    NonRetryable(TaskError),

    /// Retry budget used up
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: TaskError },

    /// The recovery handler itself failed
    #[error("recovery handler failed for '{operation}': {message}")]
    Recovery { operation: String, message: String },

    /// Job panicked outside of any task body
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskFailure {
    /// Classify a body error by its own retryable flag
    pub fn from_error(error: TaskError) -> Self {
        if error.retryable {
            TaskFailure::Retryable(error)
        } else {
            TaskFailure::NonRetryable(error)
        }
    }

    /// Short machine-readable name of the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            TaskFailure::Retryable(_) => "retryable_failure",
            TaskFailure::NonRetryable(_) => "non_retryable_failure",
            TaskFailure::RetriesExhausted { .. } => "retries_exhausted",
            TaskFailure::Recovery { .. } => "recovery_failure",
            TaskFailure::Panicked(_) => "panicked",
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable present but unparsable
    #[error("invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// Unknown rejection policy name
    #[error("invalid rejection policy: {0}")]
    UnknownRejectionPolicy(String),

    /// Parsed configuration failed validation
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

/// Errors from submitting a named operation
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No operation registered under this name
    #[error("no operation registered with name: {0}")]
    UnknownOperation(String),

    /// Executor refused the task
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}
