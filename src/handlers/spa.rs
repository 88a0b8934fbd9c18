//! Built frontend serving (production only).
//!
//! # Routes
//!
//! - `GET /` - `index.html`, with a fresh `CSRF-TOKEN` cookie
//! - `GET <path>` for paths outside `/api` - the static file at `<dist>/<path>`
//!   when it exists, otherwise `index.html` with a fresh `CSRF-TOKEN` cookie so
//!   client-side routing can take over
//!
//! Anything under `/api`, and every non-`GET`/`HEAD` request, falls through to
//! the not-found error so API 404s are never masked by the entry document.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::{CsrfToken, csrf_token_cookie};
use crate::state::AppState;

/// Whether a path belongs to the API namespace, i.e. starts with `api`
/// after at most one leading slash.
pub fn is_api_path(path: &str) -> bool {
    path.strip_prefix('/').unwrap_or(path).starts_with("api")
}

/// `GET /`.
#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    csrf: CsrfToken,
    jar: CookieJar,
) -> AppResult<Response> {
    serve_index(&state.config, &csrf, jar).await
}

/// Fallback for every request no other route answered.
#[instrument(skip_all, fields(path = %req.uri().path()))]
pub async fn fallback(
    State(state): State<AppState>,
    csrf: CsrfToken,
    jar: CookieJar,
    req: Request,
) -> AppResult<Response> {
    let is_read = matches!(*req.method(), Method::GET | Method::HEAD);
    if !is_read || is_api_path(req.uri().path()) {
        return Err(AppError::NotFound);
    }

    let response = ServeDir::new(&state.config.frontend_dist_dir)
        .oneshot(req)
        .await
        .unwrap_or_else(|never| match never {});

    if response.status() == StatusCode::NOT_FOUND {
        debug!("No static asset, serving entry document");
        return serve_index(&state.config, &csrf, jar).await;
    }

    Ok(response.map(Body::new))
}

async fn serve_index(config: &Config, csrf: &CsrfToken, jar: CookieJar) -> AppResult<Response> {
    let path = config.index_html_path();
    let html = tokio::fs::read_to_string(&path).await.map_err(|e| {
        AppError::Internal(format!(
            "Failed to read entry document {}: {e}",
            path.display()
        ))
    })?;

    let jar = jar.add(csrf_token_cookie(csrf.token(), config.cookie_policy()));
    Ok((jar, Html(html)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_api_path() {
        assert!(is_api_path("/api"));
        assert!(is_api_path("/api/doesnotexist"));
        assert!(is_api_path("/apiary"));
        assert!(is_api_path("api/users"));
        assert!(!is_api_path("/"));
        assert!(!is_api_path("/tweets/api"));
        assert!(!is_api_path("//api"));
        assert!(!is_api_path("/profile"));
    }
}
