//! # Async Task Executor
//!
//! An in-process, bounded worker pool for fire-and-forget tasks.
//!
//! ## Features
//!
//! - **Core/max sizing**: workers start per task up to the core size, then tasks queue, then extra workers start up to the max size
//! - **Rejection policies**: abort, caller-runs, discard or discard-oldest once the pool is saturated
//! - **Fixed-backoff retries**: failed attempts are resubmitted through the pool after a timer, never blocking a worker
//! - **Recovery handlers**: one terminal callback per task once retries are exhausted or a failure is not retryable
//! - **Failure reporting**: anything escaping a task reaches an explicit [`FailureReporter`]
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Dispatcher                            │
//! │  (operation name + args -> Task, per-operation policies)    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     RetryCoordinator                         │
//! │  (attempt bookkeeping, backoff timers, recovery dispatch)   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       WorkerPool                             │
//! │  (workers, bounded FIFO queue, rejection, shutdown)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is persisted: queued tasks and pending retries are lost when the
//! process exits.
//!
//! ## Example
//!
//! ```ignore
//! use taskforge_executor::prelude::*;
//!
//! let pool = WorkerPool::new(ExecutorConfig::from_env()?)?;
//! let mut dispatcher = Dispatcher::new(pool.clone());
//!
//! dispatcher.register(
//!     "send_email",
//!     RetryPolicy::from_env()?,
//!     Arc::new(LoggingRecovery),
//!     |args| async move { send(&args).await.map_err(|e| TaskError::retryable(e.to_string())) },
//! );
//!
//! dispatcher.submit_operation("send_email", vec![json!("a@example.com")]).await?;
//!
//! pool.shutdown().await;
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
mod panic;
pub mod reliability;
pub mod report;
pub mod task;
pub mod worker;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::ExecutorConfig;
    pub use crate::dispatch::Dispatcher;
    pub use crate::error::{ConfigError, DispatchError, ExecutorError, TaskFailure};
    pub use crate::reliability::{
        recovery_fn, FailureCause, LoggingRecovery, RecoveryHandler, RetryCoordinator,
        RetryPolicy, TerminalFailure,
    };
    pub use crate::report::{FailureReporter, TracingReporter, UncaughtFailure};
    pub use crate::task::{Args, Task, TaskError};
    pub use crate::worker::{
        Job, PoolStats, PoolStatus, RejectionPolicy, ShutdownOutcome, WorkerPool,
    };
}

// Re-export main types at crate root
pub use config::ExecutorConfig;
pub use dispatch::Dispatcher;
pub use error::{ConfigError, DispatchError, ExecutorError, TaskFailure};
pub use reliability::{
    recovery_fn, FailureCause, LoggingRecovery, RecoveryHandler, RetryCoordinator, RetryPolicy,
    TerminalFailure,
};
pub use report::{FailureReporter, TracingReporter, UncaughtFailure};
pub use task::{task_body, Args, Attempt, Task, TaskError, TaskPhase};
pub use worker::{
    Job, PoolStats, PoolStatus, RejectionAction, RejectionContext, RejectionHandler,
    RejectionPolicy, ShutdownOutcome, WorkerPool,
};
