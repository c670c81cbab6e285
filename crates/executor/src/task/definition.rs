//! Task definition

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::panic::panic_message;

/// Error type code given to failures converted from a panicking body
pub const PANIC_ERROR_TYPE: &str = "panic";

/// Typed failure returned by a task body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskError {
    /// Error message
    pub message: String,

    /// Error type/code for programmatic handling
    pub error_type: Option<String>,

    /// Whether this error is retryable
    ///
    /// Non-retryable errors skip the remaining retry budget and go
    /// straight to recovery.
    pub retryable: bool,

    /// Additional error details (for debugging)
    pub details: Option<serde_json::Value>,
}

impl TaskError {
    /// Create a new retryable error
    pub fn retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            retryable: true,
            details: None,
        }
    }

    /// Create a non-retryable error
    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            retryable: false,
            details: None,
        }
    }

    /// Set the error type
    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    /// Add error details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub(crate) fn panicked(message: impl Into<String>) -> Self {
        Self::non_retryable(message).with_type(PANIC_ERROR_TYPE)
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TaskError {}

/// Immutable snapshot of a task's ordered arguments
pub type Args = Arc<[serde_json::Value]>;

/// Future returned by a task body
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send>>;

/// Task body function type
///
/// Invoked once per attempt with the same arguments, so bodies must be safe
/// to call repeatedly.
pub type TaskBody = Arc<dyn Fn(Args) -> TaskFuture + Send + Sync>;

/// Wrap a closure as a [`TaskBody`]
pub fn task_body<F, Fut>(f: F) -> TaskBody
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    Arc::new(move |args| Box::pin(f(args)))
}

/// A unit of asynchronous work
///
/// # Example
///
/// ```ignore
/// use serde_json::json;
/// use taskforge_executor::{Task, TaskError};
///
/// let task = Task::new("send_email", vec![json!("a@example.com")], |args| async move {
///     let email = args[0].as_str().ok_or_else(|| TaskError::non_retryable("email"))?;
///     mailer.send(email).await.map_err(|e| TaskError::retryable(e.to_string()))
/// });
/// ```
#[derive(Clone)]
pub struct Task {
    id: Uuid,
    operation: String,
    args: Args,
    body: TaskBody,
}

impl Task {
    /// Create a task from an operation name, arguments and a body closure
    pub fn new<F, Fut>(
        operation: impl Into<String>,
        args: Vec<serde_json::Value>,
        body: F,
    ) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        Self::from_body(operation, args, task_body(body))
    }

    /// Create a task from an already type-erased body
    pub fn from_body(
        operation: impl Into<String>,
        args: Vec<serde_json::Value>,
        body: TaskBody,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            operation: operation.into(),
            args: Arc::from(args),
            body,
        }
    }

    /// Unique id of this task instance
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Operation identifier
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Original arguments
    pub fn args(&self) -> &Args {
        &self.args
    }

    /// Run the body once
    ///
    /// A panic inside the body becomes a non-retryable [`TaskError`].
    pub async fn call(&self) -> Result<(), TaskError> {
        let fut = (self.body)(Arc::clone(&self.args));
        match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(TaskError::panicked(panic_message(payload))),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("operation", &self.operation)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}
