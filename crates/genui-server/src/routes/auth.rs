use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

async fn verify_handler(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> (StatusCode, Json<VerifyResponse>) {
    match state.password.as_deref() {
        Some(expected) if expected != request.password => {
            tracing::info!("rejected password");
            (
                StatusCode::UNAUTHORIZED,
                Json(VerifyResponse {
                    success: false,
                    error: Some("Invalid password"),
                }),
            )
        }
        _ => (
            StatusCode::OK,
            Json(VerifyResponse {
                success: true,
                error: None,
            }),
        ),
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/verify", post(verify_handler))
        .with_state(state)
}
