//! Named operation dispatch
//!
//! Callers submit work by operation name and arguments. Each registered
//! operation carries its own body, retry policy and recovery handler.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::DispatchError;
use crate::reliability::{RecoveryHandler, RetryCoordinator, RetryPolicy};
use crate::task::{task_body, Args, Task, TaskBody, TaskError};
use crate::worker::WorkerPool;

struct Operation {
    body: TaskBody,
    coordinator: RetryCoordinator,
}

/// Registry of operations submitted through one worker pool
///
/// # Example
///
/// ```ignore
/// let mut dispatcher = Dispatcher::new(pool);
/// dispatcher.register(
///     "send_email",
///     RetryPolicy::default(),
///     Arc::new(LoggingRecovery),
///     move |args| { let mailer = mailer.clone(); async move { mailer.send(&args).await } },
/// );
///
/// dispatcher.submit_operation("send_email", vec![json!("a@example.com")]).await?;
/// ```
pub struct Dispatcher {
    pool: WorkerPool,
    operations: HashMap<String, Operation>,
}

impl Dispatcher {
    /// Create an empty dispatcher
    pub fn new(pool: WorkerPool) -> Self {
        Self {
            pool,
            operations: HashMap::new(),
        }
    }

    /// Register an operation from a closure
    ///
    /// Registering the same name twice replaces the earlier operation.
    pub fn register<F, Fut>(
        &mut self,
        name: impl Into<String>,
        policy: RetryPolicy,
        recovery: Arc<dyn RecoveryHandler>,
        body: F,
    ) -> &mut Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.register_body(name, policy, recovery, task_body(body))
    }

    /// Register an operation from a type-erased body
    pub fn register_body(
        &mut self,
        name: impl Into<String>,
        policy: RetryPolicy,
        recovery: Arc<dyn RecoveryHandler>,
        body: TaskBody,
    ) -> &mut Self {
        let name = name.into();
        debug!(
            operation = %name,
            max_attempts = policy.max_attempts,
            backoff_ms = policy.backoff.as_millis() as u64,
            "Registering operation"
        );
        let coordinator = RetryCoordinator::with_recovery(self.pool.clone(), policy, recovery);
        self.operations.insert(name, Operation { body, coordinator });
        self
    }

    /// Check if an operation is registered
    pub fn has_operation(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    /// Registered operation names
    pub fn operation_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Worker pool the operations run on
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Submit a named operation
    ///
    /// Acceptance is immediate and says nothing about completion.
    #[instrument(skip(self, args))]
    pub async fn submit_operation(
        &self,
        name: &str,
        args: Vec<Value>,
    ) -> Result<(), DispatchError> {
        let operation = self
            .operations
            .get(name)
            .ok_or_else(|| DispatchError::UnknownOperation(name.to_string()))?;

        let task = Task::from_body(name, args, Arc::clone(&operation.body));
        operation.coordinator.submit(task).await?;
        Ok(())
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("operations", &self.operation_names())
            .finish_non_exhaustive()
    }
}
