//! Shared handler helpers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// The router's standard not-found response.
///
/// Delivery handlers fall through to this when a lookup finds nothing, so a
/// missing script looks exactly like a path that was never routed.
pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}
