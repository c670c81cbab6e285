//! Worker pool sizing and queueing behaviour
//!
//! Runs on a paused clock so task durations are exact.

mod common;

use std::time::Duration;

use common::{sleeping_job, StartLog};
use taskforge_executor::{ExecutorConfig, ExecutorError, RejectionPolicy, WorkerPool};

fn bounded_pool() -> WorkerPool {
    let config = ExecutorConfig::new()
        .with_pool_size(2, 4)
        .with_queue_capacity(2)
        .with_rejection_policy(RejectionPolicy::Abort);
    WorkerPool::new(config).unwrap()
}

#[test_log::test(tokio::test(start_paused = true))]
async fn test_seven_tasks_against_core_two_max_four_queue_two() {
    let pool = bounded_pool();
    let log = StartLog::default();
    let t0 = tokio::time::Instant::now();

    let mut results = Vec::new();
    for i in 1..=7 {
        let job = sleeping_job(&format!("task-{i}"), Duration::from_secs(1), &log);
        results.push(pool.submit(job).await);
    }

    // Tasks 1-6 accepted, task 7 rejected
    for result in &results[..6] {
        assert!(result.is_ok());
    }
    assert!(matches!(
        &results[6],
        Err(ExecutorError::SubmissionRejected { operation, active: 4, queued: 2 })
            if operation == "task-7"
    ));

    let stats = pool.stats();
    assert_eq!(stats.workers, 4);
    assert_eq!(stats.active, 4);
    assert_eq!(stats.queued, 2);
    assert_eq!(stats.rejected, 1);

    tokio::time::sleep(Duration::from_millis(1500)).await;

    // Core workers and the two extra workers start immediately
    for op in ["task-1", "task-2", "task-5", "task-6"] {
        let started = log.started_at(op).unwrap();
        assert!(started - t0 < Duration::from_millis(100), "{op} started late");
    }

    // Queued tasks wait for the first free workers
    for op in ["task-3", "task-4"] {
        let waited = log.started_at(op).unwrap() - t0;
        assert!(waited >= Duration::from_secs(1), "{op} started early");
        assert!(waited < Duration::from_millis(1100), "{op} started late");
    }

    assert!(log.started_at("task-7").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_below_core_never_queues() {
    let pool = bounded_pool();
    let log = StartLog::default();

    pool.submit(sleeping_job("a", Duration::from_secs(1), &log)).await.unwrap();
    pool.submit(sleeping_job("b", Duration::from_secs(1), &log)).await.unwrap();

    let stats = pool.stats();
    assert_eq!(stats.workers, 2);
    assert_eq!(stats.queued, 0);
}

#[tokio::test(start_paused = true)]
async fn test_queue_is_fifo() {
    let config = ExecutorConfig::new().with_pool_size(1, 1).with_queue_capacity(10);
    let pool = WorkerPool::new(config).unwrap();
    let log = StartLog::default();

    for i in 0..5 {
        pool.submit(sleeping_job(&format!("job-{i}"), Duration::from_millis(100), &log))
            .await
            .unwrap();
    }
    assert_eq!(pool.stats().queued, 4);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        log.operations(),
        vec!["job-0", "job-1", "job-2", "job-3", "job-4"]
    );
    assert_eq!(pool.stats().completed, 5);
}

#[tokio::test(start_paused = true)]
async fn test_extra_workers_shrink_back_to_core() {
    let config = ExecutorConfig::new()
        .with_pool_size(2, 4)
        .with_queue_capacity(2)
        .with_keep_alive(Duration::from_secs(10));
    let pool = WorkerPool::new(config).unwrap();
    let log = StartLog::default();

    for i in 0..6 {
        pool.submit(sleeping_job(&format!("job-{i}"), Duration::from_secs(1), &log))
            .await
            .unwrap();
    }
    assert_eq!(pool.stats().workers, 4);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(pool.stats().workers, 4, "idle workers survive until keep-alive");

    tokio::time::sleep(Duration::from_secs(15)).await;
    let stats = pool.stats();
    assert_eq!(stats.workers, 2);
    assert_eq!(stats.completed, 6);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_submitters() {
    let config = ExecutorConfig::new().with_pool_size(4, 4).with_queue_capacity(100);
    let pool = WorkerPool::new(config).unwrap();
    let log = StartLog::default();

    let mut handles = Vec::new();
    for caller in 0..4 {
        let pool = pool.clone();
        let log = log.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..10 {
                let job = sleeping_job(&format!("c{caller}-{i}"), Duration::from_millis(10), &log);
                pool.submit(job).await.unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(log.len(), 40);
    let stats = pool.stats();
    assert_eq!(stats.completed, 40);
    assert!(stats.workers <= 4);
}
