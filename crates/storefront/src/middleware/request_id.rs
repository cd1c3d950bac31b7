//! Request correlation IDs.
//!
//! Every response carries an `x-request-id` header. An ID supplied by an
//! upstream proxy is reused when it looks sane; otherwise a UUID v4 is minted.
//! The ID is recorded on the request span and tagged on the Sentry scope.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest upstream ID we are willing to echo back.
const MAX_UPSTREAM_ID_LEN: usize = 128;

/// Attach a request ID to the span, the Sentry scope and the response.
pub async fn request_id_middleware(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(upstream_id)
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    Span::current().record("request_id", request_id.as_str());
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &request_id);
    });

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn upstream_id(value: &str) -> Option<&str> {
    let value = value.trim();
    let sane = !value.is_empty()
        && value.len() <= MAX_UPSTREAM_ID_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    sane.then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_id_accepted() {
        assert_eq!(upstream_id("abc-123_x.y"), Some("abc-123_x.y"));
    }

    #[test]
    fn test_upstream_id_rejected() {
        assert_eq!(upstream_id(""), None);
        assert_eq!(upstream_id("has space"), None);
        assert_eq!(upstream_id(&"a".repeat(129)), None);
    }
}
