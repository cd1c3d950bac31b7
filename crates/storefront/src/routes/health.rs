//! Welcome and health check endpoints.

use axum::{extract::State, http::StatusCode};
use serde::Serialize;

use crate::extract::Json;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Welcome {
    pub message: &'static str,
}

/// `GET /`
pub async fn index() -> Json<Welcome> {
    Json(Welcome {
        message: "Welcome to the E-commerce Backend System!",
    })
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store does not answer a ping.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
