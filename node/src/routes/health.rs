use axum::{Json, http::StatusCode};
use serde::Serialize;

/// Liveness response for peers and probes.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// `GET /health`
///
/// Returns a basic JSON document indicating liveness.
pub async fn health() -> (StatusCode, Json<HealthResponse>) {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}
