//! CSRF token restoration.
//!
//! # Endpoints
//!
//! - `GET /api/csrf/restore` - Mint a token, mirror it into the `CSRF-TOKEN`
//!   cookie and return it in the body
//!
//! The frontend calls this on load so that its first state-changing request
//! already has a token to send.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use tracing::instrument;

use crate::middleware::{CsrfToken, csrf_token_cookie};
use crate::state::AppState;

/// Response body of the restore endpoint.
#[derive(Debug, Serialize)]
pub struct CsrfTokenResponse {
    #[serde(rename = "CSRF-Token")]
    pub csrf_token: String,
}

/// Router mounted at `/api/csrf`.
pub fn router() -> Router<AppState> {
    Router::new().route("/restore", get(restore))
}

/// Restore the CSRF token.
///
/// # Response Body
///
/// ```json
/// { "CSRF-Token": "Xq3r9PzA-2b1d...e0" }
/// ```
#[instrument(skip_all)]
pub async fn restore(
    State(state): State<AppState>,
    csrf: CsrfToken,
    jar: CookieJar,
) -> (CookieJar, Json<CsrfTokenResponse>) {
    let token = csrf.token();
    let jar = jar.add(csrf_token_cookie(token.clone(), state.config.cookie_policy()));

    (jar, Json(CsrfTokenResponse { csrf_token: token }))
}
