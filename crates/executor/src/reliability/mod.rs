//! Retry and recovery
//!
//! This module provides:
//! - [`RetryPolicy`] - Fixed-backoff retry budget and retryable predicate
//! - [`RetryCoordinator`] - Resubmits failed attempts through the worker pool
//! - [`RecoveryHandler`] - Terminal callback once a task will not run again

mod coordinator;
mod recovery;
mod retry;

pub use coordinator::RetryCoordinator;
pub use recovery::{
    recovery_fn, FailureCause, LoggingRecovery, RecoveryFn, RecoveryHandler, TerminalFailure,
};
pub use retry::{RetryPolicy, RetryPredicate};
