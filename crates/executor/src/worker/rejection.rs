//! Rejection policies for a saturated pool
//!
//! A pool is saturated when every worker up to `max_pool_size` is busy and
//! the queue is at capacity. The configured [`RejectionHandler`] decides what
//! happens to the task that did not fit. Deciding is pure: the pool applies
//! the returned [`RejectionAction`] under its own bookkeeping.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Snapshot of pool state handed to a rejection handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectionContext<'a> {
    /// Operation of the rejected task
    pub operation: &'a str,
    /// Workers currently running a task
    pub active: usize,
    /// Live workers
    pub workers: usize,
    /// Tasks waiting in the queue
    pub queued: usize,
    /// Configured queue capacity
    pub queue_capacity: usize,
}

/// What the pool should do with a rejected task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionAction {
    /// Fail the submission with `SubmissionRejected`
    Abort,
    /// Run the task on the submitting caller before `submit` returns
    RunOnCaller,
    /// Drop the task silently
    Discard,
    /// Evict the head of the queue, then enqueue the task
    EvictOldest,
}

/// Strategy consulted when the pool cannot accept a task
pub trait RejectionHandler: Send + Sync {
    fn on_rejected(&self, ctx: &RejectionContext<'_>) -> RejectionAction;
}

/// Built-in rejection policies, selectable by configuration
///
/// # Example
///
/// ```
/// use taskforge_executor::worker::RejectionPolicy;
///
/// let policy: RejectionPolicy = "caller_runs".parse().unwrap();
/// assert_eq!(policy, RejectionPolicy::CallerRuns);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectionPolicy {
    /// Submission fails loudly
    #[default]
    Abort,
    /// Submitter executes the task itself (backpressure)
    CallerRuns,
    /// Task silently dropped
    Discard,
    /// Oldest queued task evicted, new task enqueued
    DiscardOldest,
}

impl RejectionPolicy {
    /// Canonical configuration name
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionPolicy::Abort => "abort",
            RejectionPolicy::CallerRuns => "caller-runs",
            RejectionPolicy::Discard => "discard",
            RejectionPolicy::DiscardOldest => "discard-oldest",
        }
    }
}

impl RejectionHandler for RejectionPolicy {
    fn on_rejected(&self, ctx: &RejectionContext<'_>) -> RejectionAction {
        match self {
            RejectionPolicy::Abort => RejectionAction::Abort,
            RejectionPolicy::CallerRuns => RejectionAction::RunOnCaller,
            RejectionPolicy::Discard => RejectionAction::Discard,
            // Nothing to evict from a zero-capacity queue
            RejectionPolicy::DiscardOldest if ctx.queued == 0 => RejectionAction::Discard,
            RejectionPolicy::DiscardOldest => RejectionAction::EvictOldest,
        }
    }
}

impl fmt::Display for RejectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RejectionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "abort" => Ok(RejectionPolicy::Abort),
            "caller-runs" => Ok(RejectionPolicy::CallerRuns),
            "discard" => Ok(RejectionPolicy::Discard),
            "discard-oldest" => Ok(RejectionPolicy::DiscardOldest),
            _ => Err(ConfigError::UnknownRejectionPolicy(s.to_string())),
        }
    }
}
