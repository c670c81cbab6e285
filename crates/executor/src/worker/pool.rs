//! Worker pool for task execution
//!
//! Manages a bounded set of workers and a bounded FIFO queue with pluggable
//! rejection and graceful shutdown.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, instrument, trace, warn, Instrument};

use super::job::Job;
use super::rejection::{RejectionAction, RejectionContext, RejectionHandler};
use crate::config::ExecutorConfig;
use crate::error::ExecutorError;
use crate::report::{FailureReporter, TracingReporter};

/// How often a graceful shutdown re-checks for drained work
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Worker pool status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    /// Accepting and running tasks
    Running,
    /// Finishing queued, running and already-scheduled work; not accepting new tasks
    Draining,
    /// Stopped
    Stopped,
}

/// Point-in-time counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Live workers
    pub workers: usize,
    /// Workers parked waiting for a task
    pub idle: usize,
    /// Tasks currently running on a worker
    pub active: usize,
    /// Tasks waiting in the queue
    pub queued: usize,
    /// Retries waiting on a backoff timer
    pub scheduled_retries: usize,
    /// Tasks that ran to completion on a worker or on a caller
    pub completed: u64,
    /// Submissions that hit a saturated pool
    pub rejected: u64,
}

/// Result of [`WorkerPool::shutdown`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every queued, running and scheduled task finished in time
    Drained,
    /// Graceful wait elapsed; the rest was force-terminated
    TimedOut { abandoned: usize },
    /// Immediate termination (graceful shutdown disabled)
    Terminated { abandoned: usize },
    /// The pool had already been stopped
    AlreadyStopped,
}

/// Bounded worker pool
///
/// Sizing follows a fixed order for every submission:
/// 1. fewer than `core_pool_size` workers: start a new worker for the task
/// 2. a worker is idle: hand the task to it
/// 3. the queue has room: enqueue (FIFO)
/// 4. fewer than `max_pool_size` workers: start a new worker for the task
/// 5. otherwise consult the [`RejectionHandler`]
///
/// Workers are tokio tasks named `<thread_name_prefix><n>`; a runtime must be
/// running when tasks are submitted. Cloning the pool is cheap and every clone
/// drives the same workers.
///
/// # Example
///
/// ```ignore
/// use taskforge_executor::{ExecutorConfig, Job, Task, WorkerPool};
///
/// let config = ExecutorConfig::new().with_pool_size(2, 4).with_queue_capacity(2);
/// let pool = WorkerPool::new(config)?;
///
/// pool.submit(Job::from_task(task)).await?;
///
/// // ... later, graceful shutdown
/// pool.shutdown().await;
/// ```
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    config: ExecutorConfig,
    rejection: Arc<dyn RejectionHandler>,
    reporter: Arc<dyn FailureReporter>,
    state: Mutex<PoolState>,
    terminate: CancellationToken,
    worker_seq: AtomicUsize,
}

struct PoolState {
    status: PoolStatus,
    queue: VecDeque<Job>,
    idle: VecDeque<IdleWorker>,
    workers: usize,
    active: usize,
    scheduled: usize,
    completed: u64,
    rejected: u64,
}

/// A parked worker waiting for a direct hand-off
struct IdleWorker {
    id: usize,
    tx: oneshot::Sender<Job>,
}

impl WorkerPool {
    /// Create a pool that reports uncaught failures through tracing
    pub fn new(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        Self::with_reporter(config, Arc::new(TracingReporter))
    }

    /// Create a pool with an explicit failure reporter
    pub fn with_reporter(
        config: ExecutorConfig,
        reporter: Arc<dyn FailureReporter>,
    ) -> Result<Self, ExecutorError> {
        let rejection = Arc::new(config.rejection_policy);
        Self::with_rejection_handler(config, reporter, rejection)
    }

    /// Create a pool with a custom rejection handler
    ///
    /// The handler replaces `config.rejection_policy`.
    pub fn with_rejection_handler(
        config: ExecutorConfig,
        reporter: Arc<dyn FailureReporter>,
        rejection: Arc<dyn RejectionHandler>,
    ) -> Result<Self, ExecutorError> {
        config.validate()?;

        info!(
            core_pool_size = config.core_pool_size,
            max_pool_size = config.max_pool_size,
            queue_capacity = config.queue_capacity,
            rejection_policy = %config.rejection_policy,
            "Creating worker pool"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                config,
                rejection,
                reporter,
                state: Mutex::new(PoolState {
                    status: PoolStatus::Running,
                    queue: VecDeque::new(),
                    idle: VecDeque::new(),
                    workers: 0,
                    active: 0,
                    scheduled: 0,
                    completed: 0,
                    rejected: 0,
                }),
                terminate: CancellationToken::new(),
                worker_seq: AtomicUsize::new(0),
            }),
        })
    }

    /// Submit a job
    ///
    /// Returns as soon as the job is handed to a worker or queued. Under the
    /// caller-runs policy a saturated pool runs the job on the calling task
    /// before returning.
    ///
    /// # Errors
    ///
    /// `SubmissionRejected` when saturated under the abort policy, `ShutDown`
    /// once shutdown has begun.
    #[instrument(skip_all, fields(operation = %job.operation()))]
    pub async fn submit(&self, job: Job) -> Result<(), ExecutorError> {
        self.dispatch(job, false).await.map_err(|(error, _job)| error)
    }

    /// Resubmit `job` after `delay` without occupying a worker while waiting
    ///
    /// Scheduled jobs keep a graceful shutdown waiting and are still accepted
    /// while the pool drains. A resubmission that is rejected, discarded or
    /// evicted fires the job's drop hook. Forced termination cancels the
    /// timer.
    pub fn schedule(&self, delay: Duration, job: Job) {
        let guard = ScheduledGuard::new(Arc::clone(&self.inner));
        let pool = self.clone();
        let operation = job.operation().to_string();

        tokio::spawn(async move {
            let _guard = guard;
            tokio::select! {
                biased;
                _ = pool.inner.terminate.cancelled() => {
                    warn!(%operation, "Scheduled retry cancelled by executor termination");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            if let Err((error, job)) = pool.dispatch(job, true).await {
                job.abandon(error).await;
            }
        });
    }

    /// Shut the pool down according to configuration
    ///
    /// With `wait_for_tasks_on_shutdown` the pool stops accepting new tasks
    /// and waits up to `await_termination` for queued, running and scheduled
    /// work, then force-terminates whatever remains. Without it, running tasks
    /// are interrupted and queued tasks dropped immediately.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> ShutdownOutcome {
        let graceful = self.inner.config.wait_for_tasks_on_shutdown;

        {
            let mut state = self.inner.state.lock();
            if state.status == PoolStatus::Stopped {
                return ShutdownOutcome::AlreadyStopped;
            }
            state.status = if graceful {
                PoolStatus::Draining
            } else {
                PoolStatus::Stopped
            };
            // Idle workers only exist while the queue is empty; dismiss them
            state.idle.clear();
        }

        info!(graceful, "Initiating executor shutdown");

        if !graceful {
            let abandoned = self.inner.terminate_now();
            return ShutdownOutcome::Terminated { abandoned };
        }

        let deadline = tokio::time::Instant::now() + self.inner.config.await_termination;

        loop {
            {
                let mut state = self.inner.state.lock();
                if state.workers == 0 && state.queue.is_empty() && state.scheduled == 0 {
                    state.status = PoolStatus::Stopped;
                    debug!("All tasks completed");
                    info!("Executor drained and stopped");
                    return ShutdownOutcome::Drained;
                }
            }

            if tokio::time::Instant::now() >= deadline {
                let stats = self.stats();
                warn!(
                    active = stats.active,
                    queued = stats.queued,
                    scheduled_retries = stats.scheduled_retries,
                    "Shutdown timeout reached, terminating remaining tasks"
                );
                let abandoned = self.inner.terminate_now();
                return ShutdownOutcome::TimedOut { abandoned };
            }

            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }
    }

    /// Get current status
    pub fn status(&self) -> PoolStatus {
        self.inner.state.lock().status
    }

    /// Check if new submissions are accepted
    pub fn is_accepting(&self) -> bool {
        self.status() == PoolStatus::Running
    }

    /// Snapshot of the pool counters
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            workers: state.workers,
            idle: state.idle.len(),
            active: state.active,
            queued: state.queue.len(),
            scheduled_retries: state.scheduled,
            completed: state.completed,
            rejected: state.rejected,
        }
    }

    /// Reporter for failures that escape tasks
    pub fn reporter(&self) -> &Arc<dyn FailureReporter> {
        &self.inner.reporter
    }

    /// Accept, queue or reject a job
    ///
    /// `scheduled` marks retries that were accepted before shutdown began.
    /// An error hands the job back so the caller can decide who hears about
    /// it.
    async fn dispatch(&self, job: Job, scheduled: bool) -> Result<(), (ExecutorError, Job)> {
        let (job, snapshot) = {
            let mut state = self.inner.state.lock();
            if !state.accepts(scheduled) {
                debug!(operation = %job.operation(), "Submission after shutdown");
                return Err((ExecutorError::ShutDown, job));
            }

            match self.inner.offer(&mut state, job) {
                Ok(()) => return Ok(()),
                Err(job) => (job, (state.active, state.workers, state.queue.len())),
            }
        };

        // Handlers may call back into the pool; the lock must be released here
        let (active, workers, queued) = snapshot;
        let action = self.inner.rejection.on_rejected(&RejectionContext {
            operation: job.operation(),
            active,
            workers,
            queued,
            queue_capacity: self.inner.config.queue_capacity,
        });

        let overflow = {
            let mut state = self.inner.state.lock();
            if !state.accepts(scheduled) {
                return Err((ExecutorError::ShutDown, job));
            }

            // Room may have opened up while the handler decided
            let job = match self.inner.offer(&mut state, job) {
                Ok(()) => return Ok(()),
                Err(job) => job,
            };
            state.rejected += 1;

            match action {
                RejectionAction::Abort => {
                    warn!(
                        operation = %job.operation(),
                        active = state.active,
                        queued = state.queue.len(),
                        "Pool saturated, rejecting task"
                    );
                    let error = ExecutorError::SubmissionRejected {
                        operation: job.operation().to_string(),
                        active: state.active,
                        queued: state.queue.len(),
                    };
                    return Err((error, job));
                }
                RejectionAction::Discard => {
                    debug!(operation = %job.operation(), "Pool saturated, discarding task");
                    Overflow::Drop(job)
                }
                RejectionAction::EvictOldest => match state.queue.pop_front() {
                    Some(evicted) => {
                        debug!(
                            operation = %job.operation(),
                            evicted = %evicted.operation(),
                            "Pool saturated, evicting oldest queued task"
                        );
                        state.queue.push_back(job);
                        Overflow::Drop(evicted)
                    }
                    None => Overflow::Drop(job),
                },
                RejectionAction::RunOnCaller => Overflow::Run(job),
            }
        };

        match overflow {
            Overflow::Drop(job) => {
                let operation = job.operation().to_string();
                job.abandon(ExecutorError::Discarded { operation }).await;
            }
            Overflow::Run(job) => {
                debug!(operation = %job.operation(), "Pool saturated, running task on caller");
                job.run(self.inner.reporter.as_ref(), None).await;
                self.inner.state.lock().completed += 1;
            }
        }
        Ok(())
    }
}

/// What happens to a job the pool could not place
enum Overflow {
    Drop(Job),
    Run(Job),
}

impl PoolState {
    fn accepts(&self, scheduled: bool) -> bool {
        match self.status {
            PoolStatus::Running => true,
            PoolStatus::Draining => scheduled,
            PoolStatus::Stopped => false,
        }
    }
}

impl PoolInner {
    /// Place a job with a worker or in the queue, handing it back if the
    /// pool is saturated
    fn offer(self: &Arc<Self>, state: &mut PoolState, job: Job) -> Result<(), Job> {
        if state.workers < self.config.core_pool_size {
            self.spawn_worker(state, job);
            return Ok(());
        }

        let mut job = job;
        while let Some(idle) = state.idle.pop_front() {
            match idle.tx.send(job) {
                Ok(()) => {
                    state.active += 1;
                    trace!(worker_id = idle.id, "Handed task to idle worker");
                    return Ok(());
                }
                // Receiver already gone; try the next idle worker
                Err(returned) => job = returned,
            }
        }

        if state.queue.len() < self.config.queue_capacity {
            state.queue.push_back(job);
            trace!(queued = state.queue.len(), "Task queued");
            return Ok(());
        }

        if state.workers < self.config.max_pool_size {
            self.spawn_worker(state, job);
            return Ok(());
        }

        Err(job)
    }

    fn spawn_worker(self: &Arc<Self>, state: &mut PoolState, first: Job) {
        state.workers += 1;
        state.active += 1;

        let id = self.worker_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let name = format!("{}{}", self.config.thread_name_prefix, id);
        debug!(worker = %name, workers = state.workers, "Starting worker");

        let span = info_span!("worker", worker = %name);
        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.run_worker(id, name, first).await }.instrument(span));
    }

    async fn run_worker(self: Arc<Self>, id: usize, name: String, first: Job) {
        let mut job = first;

        loop {
            let operation = job.operation().to_string();
            let completed = tokio::select! {
                biased;
                _ = self.terminate.cancelled() => false,
                _ = job.run(self.reporter.as_ref(), Some(&name)) => true,
            };
            if !completed {
                warn!(%operation, "Task interrupted by executor termination");
            }

            let (rx, timed) = {
                let mut state = self.state.lock();
                state.active -= 1;
                if completed {
                    state.completed += 1;
                }

                if self.terminate.is_cancelled() {
                    state.workers -= 1;
                    return;
                }

                if let Some(next) = state.queue.pop_front() {
                    state.active += 1;
                    job = next;
                    continue;
                }

                if state.status != PoolStatus::Running {
                    state.workers -= 1;
                    debug!("Queue drained, worker exiting");
                    return;
                }

                let (tx, rx) = oneshot::channel();
                state.idle.push_back(IdleWorker { id, tx });
                let timed =
                    self.config.allow_core_thread_timeout || state.workers > self.config.core_pool_size;
                (rx, timed)
            };

            match self.wait_for_job(id, rx, timed).await {
                Some(next) => job = next,
                None => return,
            }
        }
    }

    /// Park until a job is handed over, the keep-alive elapses or the pool
    /// terminates. Returns `None` once the worker has deregistered itself.
    async fn wait_for_job(
        &self,
        id: usize,
        mut rx: oneshot::Receiver<Job>,
        timed: bool,
    ) -> Option<Job> {
        let keep_alive = self.config.keep_alive;
        let mut timed = timed;

        loop {
            let idle_timeout = async move {
                if timed {
                    tokio::time::sleep(keep_alive).await
                } else {
                    std::future::pending::<()>().await
                }
            };

            tokio::select! {
                result = &mut rx => {
                    return match result {
                        Ok(job) => Some(job),
                        Err(_) => {
                            // Dismissed by shutdown
                            self.state.lock().workers -= 1;
                            debug!("Idle worker dismissed");
                            None
                        }
                    };
                }
                _ = idle_timeout => {}
                _ = self.terminate.cancelled() => {}
            }

            let mut state = self.state.lock();
            if let Some(pos) = state.idle.iter().position(|w| w.id == id) {
                let may_exit = self.terminate.is_cancelled()
                    || self.config.allow_core_thread_timeout
                    || state.workers > self.config.core_pool_size;
                if !may_exit {
                    // Other idle workers already shrank the pool to core size
                    timed = false;
                    continue;
                }
                state.idle.remove(pos);
                state.workers -= 1;
                debug!(keep_alive_ms = keep_alive.as_millis() as u64, "Idle worker exiting");
                return None;
            }

            // Not parked any more: either a job raced in or shutdown dismissed us
            return match rx.try_recv() {
                Ok(job) => Some(job),
                Err(_) => {
                    state.workers -= 1;
                    None
                }
            };
        }
    }

    /// Drop queued work, interrupt running work and cancel scheduled retries
    fn terminate_now(&self) -> usize {
        let abandoned = {
            let mut state = self.state.lock();
            state.status = PoolStatus::Stopped;
            state.idle.clear();
            let dropped = state.queue.len();
            state.queue.clear();
            dropped + state.active + state.scheduled
        };

        self.terminate.cancel();

        if abandoned > 0 {
            warn!(abandoned, "Executor terminated with unfinished tasks");
        } else {
            info!("Executor terminated");
        }
        abandoned
    }
}

/// Counts a pending retry timer for as long as it lives
struct ScheduledGuard {
    inner: Arc<PoolInner>,
}

impl ScheduledGuard {
    fn new(inner: Arc<PoolInner>) -> Self {
        inner.state.lock().scheduled += 1;
        Self { inner }
    }
}

impl Drop for ScheduledGuard {
    fn drop(&mut self) {
        self.inner.state.lock().scheduled -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::RejectionPolicy;
    use std::sync::Arc;

    fn noop(operation: &str) -> Job {
        Job::new(operation, Arc::from(Vec::new()), async { Ok(()) })
    }

    fn sleeper(operation: &str, duration: Duration) -> Job {
        Job::new(operation, Arc::from(Vec::new()), async move {
            tokio::time::sleep(duration).await;
            Ok(())
        })
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = WorkerPool::new(ExecutorConfig::new().with_pool_size(4, 2));
        assert!(matches!(result, Err(ExecutorError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_new_pool_is_empty_and_running() {
        let pool = WorkerPool::new(ExecutorConfig::default()).unwrap();
        assert_eq!(pool.status(), PoolStatus::Running);
        assert!(pool.is_accepting());
        assert_eq!(pool.stats(), PoolStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_core_workers_start_per_task() {
        let pool = WorkerPool::new(ExecutorConfig::new().with_pool_size(3, 3)).unwrap();

        for i in 0..3 {
            pool.submit(sleeper(&format!("t{i}"), Duration::from_secs(1)))
                .await
                .unwrap();
        }

        let stats = pool.stats();
        assert_eq!(stats.workers, 3);
        assert_eq!(stats.active, 3);
        assert_eq!(stats.queued, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_worker_receives_hand_off() {
        let pool = WorkerPool::new(ExecutorConfig::new().with_pool_size(1, 1).with_queue_capacity(0))
            .unwrap();

        pool.submit(noop("first")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(pool.stats().idle, 1);

        // Zero-capacity queue still accepts work while a worker is parked
        pool.submit(noop("second")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let stats = pool.stats();
        assert_eq!(stats.workers, 1);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.rejected, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_excess_workers_time_out() {
        let config = ExecutorConfig::new()
            .with_pool_size(1, 2)
            .with_queue_capacity(0)
            .with_keep_alive(Duration::from_secs(5));
        let pool = WorkerPool::new(config).unwrap();

        pool.submit(sleeper("a", Duration::from_secs(1))).await.unwrap();
        pool.submit(sleeper("b", Duration::from_secs(1))).await.unwrap();
        assert_eq!(pool.stats().workers, 2);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(pool.stats().idle, 2);

        tokio::time::sleep(Duration::from_secs(5)).await;
        let stats = pool.stats();
        assert_eq!(stats.workers, 1, "core worker stays alive");
        assert_eq!(stats.idle, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_core_workers_time_out_when_allowed() {
        let config = ExecutorConfig::new()
            .with_pool_size(2, 2)
            .with_keep_alive(Duration::from_secs(5))
            .with_core_thread_timeout(true);
        let pool = WorkerPool::new(config).unwrap();

        pool.submit(noop("a")).await.unwrap();
        pool.submit(noop("b")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;

        assert_eq!(pool.stats().workers, 0);

        // A new submission starts a fresh worker
        pool.submit(noop("c")).await.unwrap();
        assert_eq!(pool.stats().workers, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_graceful_shutdown_drains_queue() {
        let config = ExecutorConfig::new()
            .with_pool_size(1, 1)
            .with_queue_capacity(5)
            .with_graceful_shutdown(true, Duration::from_secs(30));
        let pool = WorkerPool::new(config).unwrap();

        for i in 0..4 {
            pool.submit(sleeper(&format!("t{i}"), Duration::from_secs(1)))
                .await
                .unwrap();
        }

        assert_eq!(pool.shutdown().await, ShutdownOutcome::Drained);
        assert_eq!(pool.status(), PoolStatus::Stopped);
        assert_eq!(pool.stats().completed, 4);
        assert_eq!(pool.stats().workers, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_graceful_shutdown_times_out() {
        let config = ExecutorConfig::new()
            .with_pool_size(1, 1)
            .with_queue_capacity(5)
            .with_graceful_shutdown(true, Duration::from_secs(2));
        let pool = WorkerPool::new(config).unwrap();

        for i in 0..3 {
            pool.submit(sleeper(&format!("t{i}"), Duration::from_secs(10)))
                .await
                .unwrap();
        }

        // One running, two queued
        assert_eq!(
            pool.shutdown().await,
            ShutdownOutcome::TimedOut { abandoned: 3 }
        );
        assert_eq!(pool.status(), PoolStatus::Stopped);
        assert_eq!(pool.stats().queued, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_shutdown_terminates() {
        let config = ExecutorConfig::new()
            .with_pool_size(1, 1)
            .with_queue_capacity(1)
            .with_graceful_shutdown(false, Duration::from_secs(30));
        let pool = WorkerPool::new(config).unwrap();

        pool.submit(sleeper("running", Duration::from_secs(10))).await.unwrap();
        pool.submit(sleeper("queued", Duration::from_secs(10))).await.unwrap();

        assert_eq!(
            pool.shutdown().await,
            ShutdownOutcome::Terminated { abandoned: 2 }
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        let stats = pool.stats();
        assert_eq!(stats.workers, 0);
        assert_eq!(stats.completed, 0);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let pool = WorkerPool::new(
            ExecutorConfig::new().with_rejection_policy(RejectionPolicy::CallerRuns),
        )
        .unwrap();

        assert_eq!(pool.shutdown().await, ShutdownOutcome::Drained);
        assert_eq!(pool.shutdown().await, ShutdownOutcome::AlreadyStopped);
        assert!(matches!(
            pool.submit(noop("late")).await,
            Err(ExecutorError::ShutDown)
        ));
    }
}
