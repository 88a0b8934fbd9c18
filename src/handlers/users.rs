//! Default users router.
//!
//! Only exposes the session restore endpoint; account management is supplied
//! by the application through [`ApiRouters`](crate::routes::ApiRouters).
//!
//! # Endpoints
//!
//! - `GET /api/users/current` - The authenticated caller, or `null`

use axum::routing::get;
use axum::{Json, Router};
use tracing::instrument;

use crate::middleware::{CurrentUser, Principal};
use crate::state::AppState;

/// Router mounted at `/api/users`.
pub fn router() -> Router<AppState> {
    Router::new().route("/current", get(current))
}

#[instrument(skip_all)]
pub async fn current(CurrentUser(user): CurrentUser) -> Json<Option<Principal>> {
    Json(user)
}
