// Health route

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use taskforge_executor::{PoolStats, PoolStatus};
use utoipa::ToSchema;

use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[schema(value_type = String)]
    pub pool: PoolStatus,
    #[schema(value_type = Object)]
    pub stats: PoolStats,
    pub operations: Vec<String>,
}

/// Create health routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(state)
}

/// GET /health - Service and pool status
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service status", body = HealthResponse),
    ),
    tag = "health"
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let pool = state.dispatcher.pool();
    let status = match pool.status() {
        PoolStatus::Running => "ok",
        PoolStatus::Draining | PoolStatus::Stopped => "shutting_down",
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        pool: pool.status(),
        stats: pool.stats(),
        operations: state
            .dispatcher
            .operation_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    })
}
