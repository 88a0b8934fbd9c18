//! Request pipeline assembly.
//!
//! The stages that run before routing are registered here, in one fixed order:
//!
//! ```text
//! Request
//!    │
//!    ▼
//!  1. RequestLog   ← span + access log line
//!  2. JsonBody     ← 400 malformed JSON, 413 too large
//!  3. FormBody     ← 400 malformed form body
//!  4. Cookies      ← CookieJar extension
//!  5. Cors         ← development only
//!  6. Csrf         ← 403 on state-changing verbs without a valid token
//!  7. AuthInit     ← Authenticator extension
//!    │
//!    ▼
//!  Routers → not-found fallback → error rendering
//! ```
//!
//! Every stage either forwards the request, answers it, or renders an
//! [`AppError`](crate::error::AppError). Later stages rely on earlier ones
//! (CSRF reads cookies and the parsed body), so the order is not configurable;
//! only the presence of `Cors` depends on the environment.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use axum::Router;
use axum::response::{IntoResponse, Response};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{debug, error};

use crate::config::Config;
use crate::error::AppError;
use crate::middleware::{
    AuthInitLayer, Authenticator, BodyParserLayer, CsrfLayer, build_cors_layer, parse_cookies,
    request_log_layer,
};

/// A pre-routing stage of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RequestLog,
    JsonBody,
    FormBody,
    Cookies,
    Cors,
    Csrf,
    AuthInit,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::RequestLog => "request-log",
            Stage::JsonBody => "json-body",
            Stage::FormBody => "form-body",
            Stage::Cookies => "cookies",
            Stage::Cors => "cors",
            Stage::Csrf => "csrf",
            Stage::AuthInit => "auth-init",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered set of stages for one configuration.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
    config: Arc<Config>,
    authenticator: Authenticator,
}

impl Pipeline {
    /// Register the stages for `config`.
    pub fn for_config(config: Arc<Config>, authenticator: Authenticator) -> Self {
        let mut stages = vec![
            Stage::RequestLog,
            Stage::JsonBody,
            Stage::FormBody,
            Stage::Cookies,
        ];
        if config.cors_enabled() {
            stages.push(Stage::Cors);
        }
        stages.extend([Stage::Csrf, Stage::AuthInit]);

        Self {
            stages,
            config,
            authenticator,
        }
    }

    /// Stages in the order a request passes through them.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Wrap `router` in every stage. The first registered stage ends up
    /// outermost, so it sees the request first and the response last.
    ///
    /// Panics raised by handlers are rendered as 500 errors inside the
    /// pipeline, so they are still logged by the logging stage.
    pub fn apply<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let mut router = router.layer(CatchPanicLayer::custom(render_panic));

        for stage in self.stages.iter().rev() {
            debug!(stage = %stage, "Registering pipeline stage");
            router = self.apply_stage(*stage, router);
        }

        router
    }

    fn apply_stage<S>(&self, stage: Stage, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let limit = self.config.max_request_body_size;

        match stage {
            Stage::RequestLog => router.layer(request_log_layer()),
            Stage::JsonBody => router.layer(BodyParserLayer::json(limit)),
            Stage::FormBody => router.layer(BodyParserLayer::urlencoded(limit)),
            Stage::Cookies => router.layer(axum::middleware::from_fn(parse_cookies)),
            Stage::Cors => router.layer(build_cors_layer(&self.config.cors_allowed_origins)),
            Stage::Csrf => router.layer(CsrfLayer::new(self.config.cookie_policy())),
            Stage::AuthInit => router.layer(AuthInitLayer::new(self.authenticator.clone())),
        }
    }
}

fn render_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };
    error!(panic = %detail, "Handler panicked");

    AppError::Internal("Internal Server Error".to_string()).into_response()
}
