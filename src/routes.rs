//! Application routing: API mounts, fallbacks and the request pipeline.
//!
//! # Route Groups
//!
//! - `/api/users`  - users router
//! - `/api/tweets` - tweets router
//! - `/api/csrf`   - CSRF token restoration
//! - production only: `/` and every other non-`/api` `GET` serve the frontend
//!
//! Each prefix belongs to exactly one router. Anything left unanswered ends
//! in the not-found error, rendered like every other error as
//! `{ message, statusCode, errors }`.

use axum::Router;
use axum::routing::get;
use tracing::info;

use crate::handlers;
use crate::pipeline::Pipeline;
use crate::state::AppState;

/// Mount prefix of the users router.
pub const USERS_PREFIX: &str = "/api/users";
/// Mount prefix of the tweets router.
pub const TWEETS_PREFIX: &str = "/api/tweets";
/// Mount prefix of the CSRF router.
pub const CSRF_PREFIX: &str = "/api/csrf";

/// Routers mounted under the API prefixes.
///
/// The application supplies its own users and tweets routers; the defaults
/// only cover what the pipeline itself needs.
pub struct ApiRouters {
    pub users: Router<AppState>,
    pub tweets: Router<AppState>,
    pub csrf: Router<AppState>,
}

impl Default for ApiRouters {
    /// - users: `GET /current`
    /// - tweets: no routes
    /// - csrf: `GET /restore`
    fn default() -> Self {
        Self {
            users: handlers::users::router(),
            tweets: Router::new(),
            csrf: handlers::csrf::router(),
        }
    }
}

impl ApiRouters {
    pub fn with_users(mut self, users: Router<AppState>) -> Self {
        self.users = users;
        self
    }

    pub fn with_tweets(mut self, tweets: Router<AppState>) -> Self {
        self.tweets = tweets;
        self
    }
}

/// Build the application router with all routes and the pipeline configured.
///
/// # Arguments
///
/// * `state` - Application state containing config and the authenticator
/// * `routers` - Routers to mount under the API prefixes
pub fn build_router(state: AppState, routers: ApiRouters) -> Router {
    let config = state.config.clone();

    let mut router = Router::new()
        .nest(USERS_PREFIX, routers.users)
        .nest(TWEETS_PREFIX, routers.tweets)
        .nest(CSRF_PREFIX, routers.csrf);

    if config.spa_enabled() {
        info!(
            dist = %config.frontend_dist_dir.display(),
            "Serving frontend from dist directory"
        );
        router = router
            .route("/", get(handlers::spa::index))
            .fallback(handlers::spa::fallback);
    } else {
        router = router.fallback(handlers::not_found);
    }

    let router = router.method_not_allowed_fallback(handlers::not_found);

    let pipeline = Pipeline::for_config(config, state.authenticator.clone());
    info!(
        stages = ?pipeline.stages().iter().map(|s| s.name()).collect::<Vec<_>>(),
        production = state.config.is_production,
        "Request pipeline assembled"
    );

    pipeline.apply(router).with_state(state)
}
