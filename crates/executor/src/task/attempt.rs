//! Attempt bookkeeping for retried tasks
//!
//! One [`Attempt`] exists at a time per in-flight task. It is owned by the
//! retry coordinator and superseded by the next attempt on retry.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::TaskError;

/// Lifecycle phase of a task under retry coordination
///
/// ```text
/// Scheduled -> Running -> Success
///                      -> RetryableFailure -> Scheduled (next attempt)
///                                          -> Recovering
///                      -> NonRetryableFailure -> Recovering
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    /// Waiting in the pool (or on a backoff timer)
    Scheduled,
    /// Body executing on a worker
    Running,
    /// Body succeeded
    Success,
    /// Body failed and the retry predicate accepted the error
    RetryableFailure,
    /// Body failed and the retry predicate refused the error
    NonRetryableFailure,
    /// Recovery handler invoked
    Recovering,
}

impl TaskPhase {
    /// Check if a transition is allowed
    pub fn can_transition_to(self, to: TaskPhase) -> bool {
        use TaskPhase::*;
        matches!(
            (self, to),
            (Scheduled, Running)
                | (Running, Success)
                | (Running, RetryableFailure)
                | (Running, NonRetryableFailure)
                | (RetryableFailure, Scheduled)
                | (RetryableFailure, Recovering)
                | (NonRetryableFailure, Recovering)
        )
    }

    /// Terminal phases end the task's lifecycle
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskPhase::Success | TaskPhase::Recovering)
    }
}

/// Outcome of a single attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Pending,
    Success,
    Failure(TaskError),
}

/// One execution try of a task
#[derive(Debug, Clone)]
pub struct Attempt {
    /// Task this attempt belongs to
    pub task_id: Uuid,

    /// Attempt number (1-based)
    pub number: u32,

    /// When this attempt is due to be handed to the pool
    pub scheduled_at: DateTime<Utc>,

    /// When the body started running
    pub started_at: Option<DateTime<Utc>>,

    /// Result of the attempt
    pub outcome: AttemptOutcome,

    phase: TaskPhase,
}

impl Attempt {
    /// First attempt of a task, scheduled now
    pub fn first(task_id: Uuid) -> Self {
        Self::numbered(task_id, 1)
    }

    /// Attempt with an explicit number, scheduled now
    pub fn numbered(task_id: Uuid, number: u32) -> Self {
        Self::due_at(task_id, number, Utc::now())
    }

    fn due_at(task_id: Uuid, number: u32, scheduled_at: DateTime<Utc>) -> Self {
        Self {
            task_id,
            number: number.max(1),
            scheduled_at,
            started_at: None,
            outcome: AttemptOutcome::Pending,
            phase: TaskPhase::Scheduled,
        }
    }

    /// Current phase
    pub fn phase(&self) -> TaskPhase {
        self.phase
    }

    /// Mark the body as running
    pub fn start(&mut self) {
        self.transition(TaskPhase::Running);
        self.started_at = Some(Utc::now());
    }

    /// Record a successful body run
    pub fn succeed(&mut self) {
        self.transition(TaskPhase::Success);
        self.outcome = AttemptOutcome::Success;
    }

    /// Record a failed body run, classified by the retry predicate
    pub fn fail(&mut self, error: TaskError, retryable: bool) {
        let next = if retryable {
            TaskPhase::RetryableFailure
        } else {
            TaskPhase::NonRetryableFailure
        };
        self.transition(next);
        self.outcome = AttemptOutcome::Failure(error);
    }

    /// Hand the task to its recovery handler
    pub fn recover(&mut self) {
        self.transition(TaskPhase::Recovering);
    }

    /// The attempt that supersedes this one after a retryable failure,
    /// due once `backoff` has elapsed
    pub fn next_after(&self, backoff: Duration) -> Attempt {
        debug_assert!(self.phase.can_transition_to(TaskPhase::Scheduled));
        let backoff = TimeDelta::from_std(backoff).unwrap_or(TimeDelta::MAX);
        let due = Utc::now()
            .checked_add_signed(backoff)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Attempt::due_at(self.task_id, self.number + 1, due)
    }

    /// The failure recorded by this attempt, if any
    pub fn error(&self) -> Option<&TaskError> {
        match &self.outcome {
            AttemptOutcome::Failure(error) => Some(error),
            _ => None,
        }
    }

    fn transition(&mut self, to: TaskPhase) {
        debug_assert!(
            self.phase.can_transition_to(to),
            "invalid attempt transition {:?} -> {:?}",
            self.phase,
            to
        );
        self.phase = to;
    }
}
