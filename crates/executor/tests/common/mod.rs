//! Shared helpers for executor integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use taskforge_executor::{
    recovery_fn, Args, FailureReporter, Job, RecoveryHandler, TaskFailure, TerminalFailure,
    UncaughtFailure,
};

/// Reporter that keeps every uncaught failure
#[derive(Default)]
pub struct CollectingReporter {
    failures: Mutex<Vec<UncaughtFailure>>,
}

impl CollectingReporter {
    pub fn failures(&self) -> Vec<UncaughtFailure> {
        self.failures.lock().clone()
    }
}

impl FailureReporter for CollectingReporter {
    fn report(&self, failure: UncaughtFailure) {
        self.failures.lock().push(failure);
    }
}

/// Recovery handler that records every terminal failure
pub fn recording_recovery() -> (Arc<Mutex<Vec<TerminalFailure>>>, Arc<dyn RecoveryHandler>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let handler = recovery_fn(move |failure: TerminalFailure| {
        let sink = Arc::clone(&sink);
        async move {
            sink.lock().push(failure);
            Ok::<(), anyhow::Error>(())
        }
    });
    (seen, Arc::new(handler))
}

/// Start times of jobs, keyed by operation
#[derive(Clone, Default)]
pub struct StartLog(Arc<Mutex<Vec<(String, Instant)>>>);

impl StartLog {
    pub fn record(&self, operation: &str) {
        self.0.lock().push((operation.to_string(), Instant::now()));
    }

    pub fn operations(&self) -> Vec<String> {
        self.0.lock().iter().map(|(op, _)| op.clone()).collect()
    }

    pub fn started_at(&self, operation: &str) -> Option<Instant> {
        self.0
            .lock()
            .iter()
            .find(|(op, _)| op == operation)
            .map(|(_, at)| *at)
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }
}

/// Job that records its start and then sleeps
pub fn sleeping_job(operation: &str, duration: Duration, log: &StartLog) -> Job {
    let log = log.clone();
    let name = operation.to_string();
    Job::new(operation, no_args(), async move {
        log.record(&name);
        tokio::time::sleep(duration).await;
        Ok::<(), TaskFailure>(())
    })
}

pub fn no_args() -> Args {
    Arc::from(Vec::new())
}
