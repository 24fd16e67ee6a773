//! Health check endpoint

use axum::{Json, Router, routing::get};
use serde::Serialize;

/// Name reported by the health check
pub const SERVICE_NAME: &str = "Voice Chatbot API";

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

/// Liveness probe
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
    })
}

/// Build health router (no state needed)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}
