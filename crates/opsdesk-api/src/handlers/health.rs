use axum::{response::IntoResponse, Json};

/// Liveness probe. Public, no database access.
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
