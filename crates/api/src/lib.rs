// Order-processing service on top of the task executor
//
// HTTP handlers accept a request, submit named operations through the
// dispatcher and answer immediately. The work itself runs on the pool.

pub mod config;
pub mod health;
pub mod operations;
pub mod orders;
pub mod password;
pub mod services;

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use taskforge_executor::Dispatcher;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

/// App state shared across routes
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        orders::process_order,
        password::forgot_password,
        health::health,
    ),
    components(schemas(password::ForgotPasswordRequest, health::HealthResponse)),
    tags(
        (name = "orders", description = "Order processing endpoints"),
        (name = "password", description = "Password reset endpoints"),
        (name = "health", description = "Service health")
    ),
    info(
        title = "Taskforge API",
        version = "0.2.0",
        description = "Submits order and email work to a bounded async executor",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
pub struct ApiDoc;

/// Build the full application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes(state.clone()))
        .merge(orders::routes(state.clone()))
        .merge(password::routes(state))
        .route("/api-doc/openapi.json", get(openapi))
        .layer(TraceLayer::new_for_http())
}

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
