// Order HTTP routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Router,
};
use serde_json::json;

use crate::operations::{ORDER_CONFIRMATION, UPDATE_STOCK};
use crate::AppState;

/// Create order routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/order/process/{order_id}", post(process_order))
        .with_state(state)
}

/// POST /api/v1/order/process/{order_id} - Queue stock update and confirmation
#[utoipa::path(
    post,
    path = "/api/v1/order/process/{order_id}",
    params(
        ("order_id" = String, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order accepted for processing", body = String),
        (status = 400, description = "Order ID is blank", body = String),
        (status = 500, description = "Executor refused the work", body = String),
    ),
    tag = "orders"
)]
pub async fn process_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> (StatusCode, String) {
    let order_id = order_id.trim();
    if order_id.is_empty() {
        return (StatusCode::BAD_REQUEST, "Order ID is required".to_string());
    }

    // Stock first, then the confirmation email
    for operation in [UPDATE_STOCK, ORDER_CONFIRMATION] {
        if let Err(e) = state
            .dispatcher
            .submit_operation(operation, vec![json!(order_id)])
            .await
        {
            tracing::error!(%order_id, operation, "Failed to submit order work: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to process order: {e}"),
            );
        }
    }

    tracing::info!(%order_id, "Order submitted for processing");
    (StatusCode::OK, "Order processed successfully".to_string())
}
