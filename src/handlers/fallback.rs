//! Not-found fallback.

use axum::http::{Method, Uri};
use tracing::debug;

use crate::error::AppError;

/// Reached when no router answered the request, or when a route matched the
/// path but not the method.
pub async fn not_found(method: Method, uri: Uri) -> AppError {
    debug!(%method, path = %uri.path(), "No route matched");
    AppError::NotFound
}
