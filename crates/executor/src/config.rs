//! Executor configuration
//!
//! Loaded from environment variables with defaults. Immutable once the
//! pool is constructed.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ExecutorError};
use crate::worker::RejectionPolicy;

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutorConfig {
    /// Workers kept alive even when idle (unless core timeout is allowed)
    pub core_pool_size: usize,

    /// Upper bound on live workers
    pub max_pool_size: usize,

    /// Tasks that may wait for a worker once all core workers are busy
    pub queue_capacity: usize,

    /// Prefix for worker names (`<prefix><n>`)
    pub thread_name_prefix: String,

    /// How long a worker above core size waits for work before exiting
    #[serde(with = "duration_secs")]
    pub keep_alive: Duration,

    /// Whether core workers also exit after `keep_alive` of idleness
    pub allow_core_thread_timeout: bool,

    /// What to do with tasks that do not fit
    pub rejection_policy: RejectionPolicy,

    /// Drain queued and running tasks on shutdown instead of terminating
    pub wait_for_tasks_on_shutdown: bool,

    /// Upper bound on the graceful drain
    #[serde(with = "duration_secs")]
    pub await_termination: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            core_pool_size: 5,
            max_pool_size: 10,
            queue_capacity: 25,
            thread_name_prefix: "async-exec-".to_string(),
            keep_alive: Duration::from_secs(60),
            allow_core_thread_timeout: false,
            rejection_policy: RejectionPolicy::Abort,
            wait_for_tasks_on_shutdown: true,
            await_termination: Duration::from_secs(30),
        }
    }
}

impl ExecutorConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `EXECUTOR_CORE_POOL_SIZE`: Core pool size (default: 5)
    /// - `EXECUTOR_MAX_POOL_SIZE`: Maximum pool size (default: 10)
    /// - `EXECUTOR_QUEUE_CAPACITY`: Queue capacity (default: 25)
    /// - `EXECUTOR_THREAD_NAME_PREFIX`: Worker name prefix (default: "async-exec-")
    /// - `EXECUTOR_ALLOW_CORE_THREAD_TIMEOUT`: Let core workers idle out (default: false)
    /// - `EXECUTOR_KEEP_ALIVE_SECONDS`: Idle keep-alive (default: 60)
    /// - `EXECUTOR_REJECTION_POLICY`: abort | caller-runs | discard | discard-oldest
    /// - `EXECUTOR_WAIT_FOR_TASKS_ON_SHUTDOWN`: Graceful shutdown (default: true)
    /// - `EXECUTOR_AWAIT_TERMINATION_SECONDS`: Graceful drain timeout (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            core_pool_size: env_parse("EXECUTOR_CORE_POOL_SIZE", defaults.core_pool_size)?,
            max_pool_size: env_parse("EXECUTOR_MAX_POOL_SIZE", defaults.max_pool_size)?,
            queue_capacity: env_parse("EXECUTOR_QUEUE_CAPACITY", defaults.queue_capacity)?,
            thread_name_prefix: env::var("EXECUTOR_THREAD_NAME_PREFIX")
                .unwrap_or(defaults.thread_name_prefix),
            keep_alive: Duration::from_secs(env_parse(
                "EXECUTOR_KEEP_ALIVE_SECONDS",
                defaults.keep_alive.as_secs(),
            )?),
            allow_core_thread_timeout: env_bool(
                "EXECUTOR_ALLOW_CORE_THREAD_TIMEOUT",
                defaults.allow_core_thread_timeout,
            )?,
            rejection_policy: match env::var("EXECUTOR_REJECTION_POLICY") {
                Ok(value) => value.parse()?,
                Err(_) => defaults.rejection_policy,
            },
            wait_for_tasks_on_shutdown: env_bool(
                "EXECUTOR_WAIT_FOR_TASKS_ON_SHUTDOWN",
                defaults.wait_for_tasks_on_shutdown,
            )?,
            await_termination: Duration::from_secs(env_parse(
                "EXECUTOR_AWAIT_TERMINATION_SECONDS",
                defaults.await_termination.as_secs(),
            )?),
        };

        config.validate()?;
        Ok(config)
    }

    /// Set core and max pool sizes
    pub fn with_pool_size(mut self, core: usize, max: usize) -> Self {
        self.core_pool_size = core;
        self.max_pool_size = max;
        self
    }

    /// Set queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set worker name prefix
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set idle keep-alive
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Allow core workers to time out
    pub fn with_core_thread_timeout(mut self, allow: bool) -> Self {
        self.allow_core_thread_timeout = allow;
        self
    }

    /// Set rejection policy
    pub fn with_rejection_policy(mut self, policy: RejectionPolicy) -> Self {
        self.rejection_policy = policy;
        self
    }

    /// Configure shutdown behaviour
    pub fn with_graceful_shutdown(mut self, wait: bool, timeout: Duration) -> Self {
        self.wait_for_tasks_on_shutdown = wait;
        self.await_termination = timeout;
        self
    }

    /// Validate sizing invariants
    pub fn validate(&self) -> Result<(), ExecutorError> {
        if self.core_pool_size == 0 {
            return Err(ExecutorError::config("core_pool_size must be at least 1"));
        }
        if self.max_pool_size < self.core_pool_size {
            return Err(ExecutorError::config(format!(
                "max_pool_size ({}) must not be less than core_pool_size ({})",
                self.max_pool_size, self.core_pool_size
            )));
        }
        if self.allow_core_thread_timeout && self.keep_alive.is_zero() {
            return Err(ExecutorError::config(
                "core thread timeout requires a non-zero keep_alive",
            ));
        }
        Ok(())
    }
}

/// Read and parse an environment variable, falling back when unset
pub(crate) fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: e.to_string(),
                value,
            })
        }
        Err(_) => Ok(default),
    }
}

/// Read a boolean environment variable ("true"/"false"/"1"/"0")
pub(crate) fn env_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(value) => match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value,
                reason: "expected a boolean".to_string(),
            }),
        },
        Err(_) => Ok(default),
    }
}

/// Serde support for Duration as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Serde support for Duration as milliseconds
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
