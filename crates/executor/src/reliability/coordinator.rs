//! Retry coordination
//!
//! Wraps a [`Task`] with a [`RetryPolicy`] and a [`RecoveryHandler`]:
//!
//! ```text
//! submit ──► pool ──► attempt n ──► Ok ──────────────────────────► done
//!                        │
//!                        └── Err ─┬─ retryable, attempts left ──► backoff timer ──► pool
//!                                 └─ otherwise ─────────────────► recovery ──► done
//! ```
//!
//! Every attempt, including retries, goes through the worker pool so retries
//! respect pool backpressure. The backoff wait runs on a timer, never on a
//! worker.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, info, instrument, warn};

use super::recovery::{FailureCause, LoggingRecovery, RecoveryHandler, TerminalFailure};
use super::retry::RetryPolicy;
use crate::error::{ExecutorError, TaskFailure};
use crate::panic::panic_message;
use crate::report::UncaughtFailure;
use crate::task::{Attempt, Task, TaskError};
use crate::worker::{Job, WorkerPool};

/// Submits tasks with retry and recovery
#[derive(Clone)]
pub struct RetryCoordinator {
    pool: WorkerPool,
    policy: Arc<RetryPolicy>,
    recovery: Arc<dyn RecoveryHandler>,
}

impl RetryCoordinator {
    /// Create a coordinator that logs terminal failures
    pub fn new(pool: WorkerPool, policy: RetryPolicy) -> Self {
        Self::with_recovery(pool, policy, Arc::new(LoggingRecovery))
    }

    /// Create a coordinator with an explicit recovery handler
    pub fn with_recovery(
        pool: WorkerPool,
        policy: RetryPolicy,
        recovery: Arc<dyn RecoveryHandler>,
    ) -> Self {
        Self {
            pool,
            policy: Arc::new(policy),
            recovery,
        }
    }

    /// Submit the first attempt of a task
    ///
    /// Only the first attempt can be rejected back to the caller; retries
    /// that cannot be resubmitted go to recovery.
    #[instrument(skip_all, fields(operation = %task.operation(), task_id = %task.id()))]
    pub async fn submit(&self, task: Task) -> Result<(), ExecutorError> {
        let run = Arc::new(RetryRun {
            task,
            pool: self.pool.clone(),
            policy: Arc::clone(&self.policy),
            recovery: Arc::clone(&self.recovery),
        });

        let job = run.job(Attempt::first(run.task.id()));
        self.pool.submit(job).await
    }
}

/// Shared state of one task under retry
///
/// Only one attempt is in flight at a time: the next attempt is created
/// after the previous one has finished.
struct RetryRun {
    task: Task,
    pool: WorkerPool,
    policy: Arc<RetryPolicy>,
    recovery: Arc<dyn RecoveryHandler>,
}

impl RetryRun {
    fn job(self: &Arc<Self>, attempt: Attempt) -> Job {
        let run = Arc::clone(self);
        Job::new(
            self.task.operation(),
            self.task.args().clone(),
            async move { run.execute(attempt).await },
        )
    }

    async fn execute(self: Arc<Self>, mut attempt: Attempt) -> Result<(), TaskFailure> {
        attempt.start();
        debug!(
            operation = %self.task.operation(),
            attempt = attempt.number,
            "Attempt started"
        );

        let error = match self.task.call().await {
            Ok(()) => {
                attempt.succeed();
                debug!(
                    operation = %self.task.operation(),
                    attempt = attempt.number,
                    "Task completed"
                );
                return Ok(());
            }
            Err(error) => error,
        };

        let retryable = self.policy.is_retryable(&error);
        attempt.fail(error.clone(), retryable);

        if !retryable {
            warn!(
                operation = %self.task.operation(),
                attempt = attempt.number,
                error = %error,
                "Non-retryable failure"
            );
            return self.recover(attempt, error, FailureCause::NonRetryable).await;
        }

        if !self.policy.has_attempts_remaining(attempt.number) {
            warn!(
                operation = %self.task.operation(),
                attempts = attempt.number,
                error = %error,
                "Retries exhausted"
            );
            return self.recover(attempt, error, FailureCause::RetriesExhausted).await;
        }

        let delay = self.policy.delay_for_attempt(attempt.number + 1);
        let next = attempt.next_after(delay);
        info!(
            operation = %self.task.operation(),
            attempt = attempt.number,
            max_attempts = self.policy.max_attempts,
            backoff_ms = delay.as_millis() as u64,
            error = %error,
            "Attempt failed, scheduling retry"
        );

        let run = Arc::clone(&self);
        let retry = self.job(next).on_dropped(move |reason| async move {
            warn!(
                operation = %run.task.operation(),
                attempt = attempt.number + 1,
                reason = %reason,
                "Retry could not be resubmitted"
            );
            if let Err(failure) = run.recover(attempt, error, FailureCause::Rejected).await {
                // Outside any job, so report directly
                run.pool.reporter().report(UncaughtFailure::new(
                    run.task.operation(),
                    run.task.args().clone(),
                    failure,
                ));
            }
        });
        self.pool.schedule(delay, retry);

        Ok(())
    }

    /// Run the recovery handler once, converting its errors and panics into
    /// a recovery failure
    async fn recover(
        &self,
        mut attempt: Attempt,
        error: TaskError,
        cause: FailureCause,
    ) -> Result<(), TaskFailure> {
        attempt.recover();

        let failure = TerminalFailure {
            task_id: attempt.task_id,
            operation: self.task.operation().to_string(),
            args: self.task.args().clone(),
            error,
            attempts: attempt.number,
            cause,
        };

        let outcome = AssertUnwindSafe(self.recovery.on_exhausted(&failure))
            .catch_unwind()
            .await;

        let message = match outcome {
            Ok(Ok(())) => {
                debug!(operation = %failure.operation, %cause, "Recovery completed");
                return Ok(());
            }
            Ok(Err(e)) => format!("{e:#}"),
            Err(payload) => panic_message(payload),
        };

        Err(TaskFailure::Recovery {
            operation: failure.operation,
            message,
        })
    }
}
