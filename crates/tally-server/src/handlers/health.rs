//! Liveness and fallback handlers

use axum::{http::StatusCode, http::Uri, response::IntoResponse, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub timestamp: String,
}

/// Health check (no auth)
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: "Tally API is running",
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// JSON 404 for unknown routes
pub async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "Route not found",
            "path": uri.path(),
        })),
    )
}
