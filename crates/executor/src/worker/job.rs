//! Jobs: what the pool actually queues and runs

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;

use tracing::debug;

use crate::error::{ExecutorError, TaskFailure};
use crate::panic::panic_message;
use crate::report::{FailureReporter, UncaughtFailure};
use crate::task::{Args, Task};

type DropHook = Box<dyn FnOnce(ExecutorError) -> BoxFuture<'static, ()> + Send>;

/// A single schedulable run of some work
///
/// A job runs at most once. Its operation name and arguments travel with it
/// so that a failure escaping the job can be reported with full context.
pub struct Job {
    operation: String,
    args: Args,
    future: BoxFuture<'static, Result<(), TaskFailure>>,
    on_dropped: Option<DropHook>,
}

impl Job {
    /// Create a job from a future
    pub fn new<F>(operation: impl Into<String>, args: Args, future: F) -> Self
    where
        F: Future<Output = Result<(), TaskFailure>> + Send + 'static,
    {
        Self {
            operation: operation.into(),
            args,
            future: future.boxed(),
            on_dropped: None,
        }
    }

    /// Run `hook` if the pool gives up on this job without running it
    ///
    /// Fires when the job is discarded, evicted from the queue, or rejected
    /// with nobody waiting on the submission. Forced termination drops
    /// queued jobs without firing it.
    pub fn on_dropped<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce(ExecutorError) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_dropped = Some(Box::new(move |reason| hook(reason).boxed()));
        self
    }

    /// Run a task once with no retry coordination
    ///
    /// A body error becomes an uncaught failure.
    pub fn from_task(task: Task) -> Self {
        let operation = task.operation().to_string();
        let args = task.args().clone();
        Self::new(operation, args, async move {
            task.call().await.map_err(TaskFailure::from_error)
        })
    }

    /// Operation name
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Arguments
    pub fn args(&self) -> &Args {
        &self.args
    }

    /// Give up on the job without running it
    pub(crate) async fn abandon(self, reason: ExecutorError) {
        match self.on_dropped {
            Some(hook) => hook(reason).await,
            None => debug!(operation = %self.operation, %reason, "Job dropped"),
        }
    }

    /// Run the job, reporting anything that escapes it
    ///
    /// Returns `true` if the job completed without an uncaught failure.
    pub(crate) async fn run(self, reporter: &dyn FailureReporter, worker: Option<&str>) -> bool {
        let Job {
            operation,
            args,
            future,
            ..
        } = self;

        let failure = match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(())) => return true,
            Ok(Err(failure)) => failure,
            Err(payload) => TaskFailure::Panicked(panic_message(payload)),
        };

        reporter.report(UncaughtFailure::new(operation, args, failure).on_worker(worker));
        false
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("operation", &self.operation)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}
