//! HTTP route handlers for the storefront API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /                        - Welcome message
//! GET    /health                  - Liveness
//! GET    /health/ready            - Readiness (store ping)
//!
//! # Auth (rate limited)
//! POST   /auth/signup
//! POST   /auth/signin             - JSON or OAuth2 password form
//! POST   /auth/forgot-password
//! POST   /auth/reset-password
//!
//! # Public catalog
//! GET    /products                - Filter, sort, page
//! GET    /products/search
//! GET    /products/{id}
//!
//! # Catalog management (admin)
//! POST   /admin/products
//! GET    /admin/products
//! GET    /admin/products/{id}
//! PUT    /admin/products/{id}     - Owner only
//! DELETE /admin/products/{id}     - Owner only
//!
//! # Shopping (role user)
//! POST   /cart
//! GET    /cart
//! PUT    /cart/{product_id}
//! DELETE /cart/{product_id}
//! POST   /checkout
//! GET    /orders
//! GET    /orders/{id}
//! ```

pub mod admin_products;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod health;
pub mod orders;
pub mod products;

use axum::{
    Router,
    routing::{get, post, put},
};
use serde::Serialize;

use crate::error::AppError;
use crate::middleware::auth_rate_limiter;
use crate::state::AppState;

/// `{"message": ...}` response body.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

impl Message {
    #[must_use]
    pub const fn new(message: &'static str) -> Self {
        Self { message }
    }
}

/// Create the auth routes router.
pub fn auth_routes(rate_limited: bool) -> Router<AppState> {
    let router = Router::new()
        .route("/signup", post(auth::signup))
        .route("/signin", post(auth::signin))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password));

    if rate_limited {
        router.layer(auth_rate_limiter())
    } else {
        router
    }
}

/// Create the public product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::list))
        .route("/search", get(products::search))
        .route("/{id}", get(products::show))
}

/// Create the admin product routes router.
pub fn admin_product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_products::list).post(admin_products::create))
        .route(
            "/{id}",
            get(admin_products::show)
                .put(admin_products::update)
                .delete(admin_products::delete),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).post(cart::add))
        .route("/{product_id}", put(cart::update).delete(cart::remove))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::list))
        .route("/{id}", get(orders::show))
}

/// Create all routes for the storefront.
pub fn routes(rate_limit_auth: bool) -> Router<AppState> {
    Router::new()
        .route("/", get(health::index))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/auth", auth_routes(rate_limit_auth))
        .nest("/products", product_routes())
        .nest("/admin/products", admin_product_routes())
        .nest("/cart", cart_routes())
        .route("/checkout", post(checkout::checkout))
        .nest("/orders", order_routes())
        .fallback(not_found)
}

async fn not_found() -> AppError {
    AppError::NotFound("Not Found".to_owned())
}
