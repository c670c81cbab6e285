// Taskforge API server
// Decision: The pool is shut down only after the HTTP server stops accepting requests

use std::sync::Arc;

use anyhow::{Context, Result};
use taskforge_api::{
    config::ServerConfig,
    operations,
    router,
    services::{EmailService, OrderService, SimulatedEmailService, SimulatedOrderService},
    AppState,
};
use taskforge_executor::{Dispatcher, ExecutorConfig, RetryPolicy, ShutdownOutcome, WorkerPool};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "taskforge_api=debug,taskforge_executor=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("taskforge-api starting...");

    let server_config = ServerConfig::from_env().context("Invalid server configuration")?;
    let executor_config = ExecutorConfig::from_env().context("Invalid executor configuration")?;
    let retry_policy = RetryPolicy::from_env().context("Invalid retry configuration")?;

    tracing::info!(
        core = executor_config.core_pool_size,
        max = executor_config.max_pool_size,
        queue = executor_config.queue_capacity,
        policy = ?executor_config.rejection_policy,
        max_attempts = retry_policy.max_attempts,
        backoff_ms = retry_policy.backoff.as_millis() as u64,
        "Executor configured"
    );

    let pool = WorkerPool::new(executor_config).context("Failed to create worker pool")?;

    // Collaborators
    let email: Arc<dyn EmailService> =
        Arc::new(SimulatedEmailService::new(server_config.simulated_latency));
    let orders: Arc<dyn OrderService> = Arc::new(SimulatedOrderService::new(
        Arc::clone(&email),
        server_config.simulated_latency,
    ));

    let mut dispatcher = Dispatcher::new(pool.clone());
    operations::register(&mut dispatcher, email, orders, &retry_policy);

    let app = router(AppState::new(dispatcher));

    // Start server
    let listener = tokio::net::TcpListener::bind(&server_config.bind_address)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", server_config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    match pool.shutdown().await {
        ShutdownOutcome::Drained | ShutdownOutcome::AlreadyStopped => {
            tracing::info!("Worker pool drained");
        }
        ShutdownOutcome::TimedOut { abandoned } => {
            tracing::warn!(abandoned, "Worker pool shutdown timed out");
        }
        ShutdownOutcome::Terminated { abandoned } => {
            tracing::warn!(abandoned, "Worker pool terminated");
        }
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
