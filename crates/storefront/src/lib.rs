//! Emporium storefront library.
//!
//! The HTTP API as a library: the binary in `main.rs` wires configuration,
//! telemetry and the store, and the integration tests boot the same
//! [`app`] over the in-memory store.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, body::Body, http::Request};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the complete router with its middleware stack.
///
/// Serve it with `into_make_service_with_connect_info::<SocketAddr>()` so
/// the auth rate limiter can fall back to the peer address.
pub fn app(state: AppState) -> Router {
    let rate_limit_auth = state.config().rate_limit_auth;

    routes::routes(rate_limit_auth)
        .with_state(state)
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                    user_id = tracing::field::Empty,
                )
            }),
        )
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
