//! Behaviour of each rejection policy once the pool is saturated

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{no_args, sleeping_job, CollectingReporter, StartLog};
use parking_lot::Mutex;
use taskforge_executor::{
    ExecutorConfig, ExecutorError, Job, RejectionAction, RejectionContext, RejectionHandler,
    PoolStats, RejectionPolicy, TaskFailure, WorkerPool,
};

/// One worker; `queue` slots
fn saturated_pool(policy: RejectionPolicy, queue: usize) -> WorkerPool {
    let config = ExecutorConfig::new()
        .with_pool_size(1, 1)
        .with_queue_capacity(queue)
        .with_rejection_policy(policy);
    WorkerPool::new(config).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_abort_signals_caller() {
    let pool = saturated_pool(RejectionPolicy::Abort, 0);
    let log = StartLog::default();

    pool.submit(sleeping_job("running", Duration::from_secs(1), &log)).await.unwrap();
    let err = pool
        .submit(sleeping_job("rejected", Duration::from_secs(1), &log))
        .await
        .unwrap_err();

    assert!(err.is_rejection());
    assert_eq!(pool.stats().rejected, 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(log.operations(), vec!["running"]);
}

#[tokio::test(start_paused = true)]
async fn test_caller_runs_executes_before_submit_returns() {
    let pool = saturated_pool(RejectionPolicy::CallerRuns, 0);
    let log = StartLog::default();
    pool.submit(sleeping_job("running", Duration::from_secs(5), &log)).await.unwrap();

    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    let job = Job::new("on-caller", no_args(), async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        flag.store(true, Ordering::SeqCst);
        Ok::<(), TaskFailure>(())
    });

    let before = tokio::time::Instant::now();
    pool.submit(job).await.unwrap();

    assert!(ran.load(Ordering::SeqCst));
    assert!(before.elapsed() >= Duration::from_millis(200));
    // Still only the original worker
    assert_eq!(pool.stats().workers, 1);
    assert_eq!(pool.stats().completed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_caller_runs_failure_is_reported_without_worker() {
    let reporter = Arc::new(CollectingReporter::default());
    let config = ExecutorConfig::new()
        .with_pool_size(1, 1)
        .with_queue_capacity(0)
        .with_rejection_policy(RejectionPolicy::CallerRuns);
    let pool = WorkerPool::with_reporter(config, reporter.clone()).unwrap();
    let log = StartLog::default();
    pool.submit(sleeping_job("running", Duration::from_secs(5), &log)).await.unwrap();

    let job = Job::new("on-caller", no_args(), async {
        Err::<(), _>(TaskFailure::Panicked("caller side".into()))
    });
    pool.submit(job).await.unwrap();

    let failures = reporter.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].operation, "on-caller");
    assert!(failures[0].worker.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_discard_drops_silently() {
    let pool = saturated_pool(RejectionPolicy::Discard, 1);
    let log = StartLog::default();

    pool.submit(sleeping_job("a", Duration::from_secs(1), &log)).await.unwrap();
    pool.submit(sleeping_job("b", Duration::from_secs(1), &log)).await.unwrap();
    pool.submit(sleeping_job("c", Duration::from_secs(1), &log))
        .await
        .expect("discard never fails the caller");

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(log.operations(), vec!["a", "b"]);
    assert_eq!(pool.stats().rejected, 1);
}

#[tokio::test(start_paused = true)]
async fn test_discard_oldest_evicts_queue_head() {
    let pool = saturated_pool(RejectionPolicy::DiscardOldest, 2);
    let log = StartLog::default();

    for op in ["a", "b", "c", "d"] {
        pool.submit(sleeping_job(op, Duration::from_secs(1), &log)).await.unwrap();
    }
    assert_eq!(pool.stats().queued, 2);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(log.operations(), vec!["a", "c", "d"]);
}

#[tokio::test(start_paused = true)]
async fn test_discard_oldest_without_queue_drops_new_task() {
    let pool = saturated_pool(RejectionPolicy::DiscardOldest, 0);
    let log = StartLog::default();

    pool.submit(sleeping_job("a", Duration::from_secs(1), &log)).await.unwrap();
    pool.submit(sleeping_job("b", Duration::from_secs(1), &log)).await.unwrap();

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(log.operations(), vec!["a"]);
}

struct CountingHandler {
    calls: AtomicUsize,
}

impl RejectionHandler for CountingHandler {
    fn on_rejected(&self, ctx: &RejectionContext<'_>) -> RejectionAction {
        assert_eq!(ctx.workers, 1);
        assert_eq!(ctx.queue_capacity, 0);
        self.calls.fetch_add(1, Ordering::SeqCst);
        RejectionAction::Discard
    }
}

#[tokio::test(start_paused = true)]
async fn test_custom_rejection_handler() {
    let handler = Arc::new(CountingHandler {
        calls: AtomicUsize::new(0),
    });
    let config = ExecutorConfig::new().with_pool_size(1, 1).with_queue_capacity(0);
    let pool = WorkerPool::with_rejection_handler(
        config,
        Arc::new(CollectingReporter::default()),
        handler.clone(),
    )
    .unwrap();
    let log = StartLog::default();

    for op in ["a", "b", "c"] {
        pool.submit(sleeping_job(op, Duration::from_secs(1), &log)).await.unwrap();
    }

    assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
}

/// Handler that inspects the pool it belongs to before deciding
#[derive(Default)]
struct PoolReadingHandler {
    pool: Mutex<Option<WorkerPool>>,
    seen: Mutex<Vec<PoolStats>>,
}

impl RejectionHandler for PoolReadingHandler {
    fn on_rejected(&self, _ctx: &RejectionContext<'_>) -> RejectionAction {
        if let Some(pool) = self.pool.lock().as_ref() {
            self.seen.lock().push(pool.stats());
        }
        RejectionAction::Discard
    }
}

#[tokio::test(start_paused = true)]
async fn test_rejection_handler_may_read_pool_stats() {
    let handler = Arc::new(PoolReadingHandler::default());
    let config = ExecutorConfig::new().with_pool_size(1, 1).with_queue_capacity(0);
    let pool = WorkerPool::with_rejection_handler(
        config,
        Arc::new(CollectingReporter::default()),
        handler.clone(),
    )
    .unwrap();
    *handler.pool.lock() = Some(pool.clone());
    let log = StartLog::default();

    pool.submit(sleeping_job("a", Duration::from_secs(1), &log)).await.unwrap();
    pool.submit(sleeping_job("b", Duration::from_secs(1), &log)).await.unwrap();

    let seen = handler.seen.lock().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].workers, 1);
    assert_eq!(seen[0].active, 1);
    assert_eq!(pool.stats().rejected, 1);

    // Break the pool <-> handler cycle
    handler.pool.lock().take();
}

/// Job whose drop hook records the reason it was given up on
fn hooked_job(operation: &str, dropped: &Arc<Mutex<Vec<String>>>) -> Job {
    let sink = Arc::clone(dropped);
    let name = operation.to_string();
    Job::new(operation, no_args(), async { Ok(()) }).on_dropped(move |reason| async move {
        sink.lock().push(format!("{name}: {reason}"));
    })
}

#[tokio::test(start_paused = true)]
async fn test_discarded_job_fires_drop_hook() {
    let pool = saturated_pool(RejectionPolicy::Discard, 0);
    let log = StartLog::default();
    let dropped = Arc::new(Mutex::new(Vec::new()));

    pool.submit(sleeping_job("running", Duration::from_secs(1), &log)).await.unwrap();
    pool.submit(hooked_job("late", &dropped)).await.unwrap();

    assert_eq!(
        *dropped.lock(),
        vec!["late: task 'late' discarded: pool saturated".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_evicted_job_fires_drop_hook() {
    let pool = saturated_pool(RejectionPolicy::DiscardOldest, 1);
    let log = StartLog::default();
    let dropped = Arc::new(Mutex::new(Vec::new()));

    pool.submit(sleeping_job("running", Duration::from_secs(1), &log)).await.unwrap();
    pool.submit(hooked_job("oldest", &dropped)).await.unwrap();
    pool.submit(sleeping_job("newest", Duration::ZERO, &log)).await.unwrap();

    assert_eq!(
        *dropped.lock(),
        vec!["oldest: task 'oldest' discarded: pool saturated".to_string()]
    );

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(log.operations(), vec!["running", "newest"]);
}

#[tokio::test]
async fn test_shutdown_rejects_under_every_policy() {
    for policy in [
        RejectionPolicy::Abort,
        RejectionPolicy::CallerRuns,
        RejectionPolicy::Discard,
        RejectionPolicy::DiscardOldest,
    ] {
        let pool = saturated_pool(policy, 1);
        pool.shutdown().await;

        let log = StartLog::default();
        let result = pool.submit(sleeping_job("late", Duration::ZERO, &log)).await;
        assert!(matches!(result, Err(ExecutorError::ShutDown)), "{policy}");
        assert_eq!(log.len(), 0);
    }
}
