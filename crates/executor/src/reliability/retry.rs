//! Retry policy implementation

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{duration_millis, env_parse};
use crate::error::{ConfigError, ExecutorError};
use crate::task::TaskError;

/// Custom retryable-failure predicate
#[derive(Clone)]
pub struct RetryPredicate(Arc<dyn Fn(&TaskError) -> bool + Send + Sync>);

impl RetryPredicate {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&TaskError) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    fn matches(&self, error: &TaskError) -> bool {
        (self.0)(error)
    }
}

impl fmt::Debug for RetryPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RetryPredicate(..)")
    }
}

impl PartialEq for RetryPredicate {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Configuration for task retries
///
/// Every retry waits the same fixed backoff, measured from the end of the
/// failed attempt.
///
/// # Example
///
/// ```
/// use taskforge_executor::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::fixed(Duration::from_millis(2000), 3)
///     .with_non_retryable_error("INVALID_INPUT");
///
/// assert!(policy.has_attempts_remaining(2));
/// assert!(!policy.has_attempts_remaining(3));
/// assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(2000));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including initial)
    pub max_attempts: u32,

    /// Delay between a failed attempt and its retry
    #[serde(with = "duration_millis")]
    pub backoff: Duration,

    /// Error types that should NOT be retried
    #[serde(default)]
    pub non_retryable_errors: Vec<String>,

    /// Replaces the default retryable check when set
    #[serde(skip)]
    pub predicate: Option<RetryPredicate>,
}

impl Default for RetryPolicy {
    /// 3 attempts, 2 seconds apart
    fn default() -> Self {
        Self::fixed(Duration::from_millis(2000), 3)
    }
}

impl RetryPolicy {
    /// Create a policy with a fixed backoff between attempts
    pub fn fixed(backoff: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff,
            non_retryable_errors: vec![],
            predicate: None,
        }
    }

    /// Create a policy that never retries
    pub fn no_retry() -> Self {
        Self::fixed(Duration::ZERO, 1)
    }

    /// Create a policy from environment variables
    ///
    /// - `RETRY_MAX_ATTEMPTS`: Maximum attempts (default: 3)
    /// - `RETRY_BACKOFF_MS`: Fixed backoff in milliseconds (default: 2000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let policy = Self::fixed(
            Duration::from_millis(env_parse(
                "RETRY_BACKOFF_MS",
                defaults.backoff.as_millis() as u64,
            )?),
            env_parse("RETRY_MAX_ATTEMPTS", defaults.max_attempts)?,
        );
        policy.validate()?;
        Ok(policy)
    }

    /// Set the maximum number of attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the backoff delay
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Add a non-retryable error type
    pub fn with_non_retryable_error(mut self, error_type: impl Into<String>) -> Self {
        self.non_retryable_errors.push(error_type.into());
        self
    }

    /// Replace the retryable-failure predicate
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&TaskError) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(RetryPredicate::new(predicate));
        self
    }

    /// Validate the policy
    pub fn validate(&self) -> Result<(), ExecutorError> {
        if self.max_attempts == 0 {
            return Err(ExecutorError::config("max_attempts must be at least 1"));
        }
        Ok(())
    }

    /// Delay before the given attempt number (1-based)
    ///
    /// The first attempt runs immediately; every retry waits `backoff`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            self.backoff
        }
    }

    /// Check if an error type should be retried
    pub fn should_retry(&self, error_type: Option<&str>) -> bool {
        match error_type {
            Some(error_type) => !self.non_retryable_errors.iter().any(|e| e == error_type),
            None => true,
        }
    }

    /// Whether a failure qualifies for retry
    ///
    /// With no custom predicate, an error is retryable when it says so and
    /// its type is not listed in `non_retryable_errors`.
    pub fn is_retryable(&self, error: &TaskError) -> bool {
        match &self.predicate {
            Some(predicate) => predicate.matches(error),
            None => error.retryable && self.should_retry(error.error_type.as_deref()),
        }
    }

    /// Check if there are remaining attempts
    pub fn has_attempts_remaining(&self, current_attempt: u32) -> bool {
        current_attempt < self.max_attempts
    }
}
