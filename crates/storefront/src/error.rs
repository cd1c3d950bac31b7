//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. The response body is always
//! the JSON envelope `{"error": true, "message": ..., "code": <status>}`.
//! Server-side failures are captured to Sentry and answered with a generic
//! message so internal details never reach the client.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::catalog::CatalogError;
use crate::services::checkout::CheckoutError;
use crate::services::orders::OrderError;

/// Message sent for every unexpected server error.
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred.";

/// Message sent when a bearer token is missing or invalid.
pub const UNAUTHORIZED_MESSAGE: &str = "Could not validate credentials";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Missing or invalid bearer token.
    #[error("Unauthorized")]
    Unauthorized,

    /// Authenticated, but the role does not allow this.
    #[error("Forbidden: {0}")]
    Forbidden(&'static str),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: bool,
    message: String,
    code: u16,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Auth(err) => match err {
                AuthError::InvalidEmail(_)
                | AuthError::EmptyName
                | AuthError::WeakPassword(_)
                | AuthError::InvalidResetToken
                | AuthError::ResetTokenExpired => StatusCode::BAD_REQUEST,
                AuthError::EmailTaken => StatusCode::CONFLICT,
                AuthError::UnknownEmail
                | AuthError::WrongPassword
                | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::NoSuchUser => StatusCode::NOT_FOUND,
                AuthError::Notify(_)
                | AuthError::Token(_)
                | AuthError::Repository(_)
                | AuthError::PasswordHash => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Catalog(err) => match err {
                CatalogError::Validation(_) => StatusCode::BAD_REQUEST,
                CatalogError::NotFound => StatusCode::NOT_FOUND,
                CatalogError::NameTaken(_) => StatusCode::CONFLICT,
                CatalogError::NotOwnerUpdate | CatalogError::NotOwnerDelete => {
                    StatusCode::FORBIDDEN
                }
                CatalogError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Cart(err) => match err {
                CartError::Validation(_) | CartError::OutOfStock => StatusCode::BAD_REQUEST,
                CartError::ProductNotFound | CartError::NotInCart => StatusCode::NOT_FOUND,
                CartError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart
                | CheckoutError::InsufficientStock { .. }
                | CheckoutError::TotalTooLarge => StatusCode::BAD_REQUEST,
                CheckoutError::ProductNotFound(_) => StatusCode::NOT_FOUND,
                CheckoutError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Order(err) => match err {
                OrderError::NotFound => StatusCode::NOT_FOUND,
                OrderError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message shown to the client.
    fn client_message(&self) -> String {
        match self {
            Self::Auth(AuthError::Notify(_)) => "Failed to send reset email".to_owned(),
            Self::Auth(AuthError::InvalidCredentials) | Self::Unauthorized => {
                UNAUTHORIZED_MESSAGE.to_owned()
            }
            _ if self.status().is_server_error() => GENERIC_ERROR_MESSAGE.to_owned(),
            Self::Auth(err) => err.to_string(),
            Self::Catalog(err) => err.to_string(),
            Self::Cart(err) => err.to_string(),
            Self::Checkout(err) => err.to_string(),
            Self::Order(err) => err.to_string(),
            Self::Forbidden(msg) => (*msg).to_owned(),
            Self::NotFound(msg) | Self::BadRequest(msg) => msg.clone(),
            Self::Database(_) | Self::Internal(_) => GENERIC_ERROR_MESSAGE.to_owned(),
        }
    }

    const fn is_bearer_challenge(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized | Self::Auth(AuthError::InvalidCredentials)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = ErrorBody {
            error: true,
            message: self.client_message(),
            code: status.as_u16(),
        };
        let mut response = (status, Json(body)).into_response();

        if self.is_bearer_challenge() {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the authenticated user.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use emporium_core::ProductId;

    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_envelope_shape() {
        let (status, body) = body_json(AppError::Cart(CartError::OutOfStock)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            serde_json::json!({
                "error": true,
                "message": "Product is out of stock.",
                "code": 400
            })
        );
    }

    #[tokio::test]
    async fn test_server_errors_are_generic() {
        let (status, body) = body_json(AppError::Database(RepositoryError::DataCorruption(
            "secret detail".to_string(),
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], GENERIC_ERROR_MESSAGE);

        let (_, body) = body_json(AppError::Catalog(CatalogError::Repository(
            RepositoryError::NotFound,
        )))
        .await;
        assert_eq!(body["message"], GENERIC_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_unauthorized_sets_bearer_challenge() {
        let response = AppError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");

        let response = AppError::Auth(AuthError::WrongPassword).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::Auth(AuthError::EmailTaken), StatusCode::CONFLICT),
            (AppError::Auth(AuthError::NoSuchUser), StatusCode::NOT_FOUND),
            (
                AppError::Auth(AuthError::ResetTokenExpired),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Catalog(CatalogError::NotOwnerDelete),
                StatusCode::FORBIDDEN,
            ),
            (
                AppError::Checkout(CheckoutError::ProductNotFound(ProductId::new(3))),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::Checkout(CheckoutError::EmptyCart),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Checkout(CheckoutError::TotalTooLarge),
                StatusCode::BAD_REQUEST,
            ),
            (AppError::Order(OrderError::NotFound), StatusCode::NOT_FOUND),
            (AppError::Forbidden("Admins only"), StatusCode::FORBIDDEN),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{err}");
        }
    }

    #[tokio::test]
    async fn test_notify_failure_message() {
        let err = AppError::Auth(AuthError::Notify(
            crate::services::notifier::NotifyError::InvalidAddress("x".to_string()),
        ));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to send reset email");
    }
}
