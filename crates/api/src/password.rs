// Password HTTP routes

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::operations::SEND_EMAIL;
use crate::AppState;

const TEMPORARY_PASSWORD: &str = "P@ssw0rd";
const SUBJECT: &str = "Forgot Password";

/// Request body for a password reset
#[derive(Debug, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

/// Create password routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/password/forgot-password", post(forgot_password))
        .with_state(state)
}

/// POST /api/v1/password/forgot-password - Queue a password reset email
#[utoipa::path(
    post,
    path = "/api/v1/password/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset email accepted for delivery", body = String),
        (status = 400, description = "Email is missing or blank", body = String),
        (status = 500, description = "Executor refused the work", body = String),
    ),
    tag = "password"
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> (StatusCode, String) {
    let email = match req.email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() => email.to_string(),
        _ => return (StatusCode::BAD_REQUEST, "Email is required".to_string()),
    };

    let args = vec![json!(email), json!(reset_message()), json!(SUBJECT)];
    match state.dispatcher.submit_operation(SEND_EMAIL, args).await {
        Ok(()) => (
            StatusCode::OK,
            "Password reset email sent successfully".to_string(),
        ),
        Err(e) => {
            tracing::error!(%email, "Failed to submit reset email: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to send email: {e}"),
            )
        }
    }
}

fn reset_message() -> String {
    format!(
        "You have requested to reset your password. \
         A temporary password has been generated for you: {TEMPORARY_PASSWORD}.\n\
         For security reasons, please log in and change your password immediately.\n\
         If you did not request this password reset, please ignore this email or contact our support team."
    )
}
