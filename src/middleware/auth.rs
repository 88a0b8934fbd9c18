//! Authentication initialization stage.
//!
//! The stage never rejects a request. It attaches an [`Authenticator`] to the
//! request extensions so routers can resolve the caller on demand through the
//! [`CurrentUser`] and [`RequireUser`] extractors.
//!
//! How a caller is identified (sessions, JWTs, ...) is up to the
//! [`AuthStrategy`] the application is built with. The default
//! [`AnonymousStrategy`] treats every request as unauthenticated.
//!
//! # Usage
//!
//! ```rust,ignore
//! async fn current(CurrentUser(user): CurrentUser) -> Json<Option<Principal>> {
//!     Json(user)
//! }
//!
//! async fn create_tweet(RequireUser(author): RequireUser, body: ParsedBody) -> AppResult<...> {
//!     // author is guaranteed to be authenticated here
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{Request, StatusCode};
use serde::{Deserialize, Serialize};
use tower::{Layer, Service};
use tracing::debug;

use crate::error::{AppError, AppResult};

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub username: String,
}

/// A way of identifying the caller of a request.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Resolve the caller. `Ok(None)` means unauthenticated; `Err` is reserved
    /// for failures such as a malformed or expired credential.
    async fn authenticate(&self, parts: &Parts) -> AppResult<Option<Principal>>;
}

/// Strategy that never authenticates anyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousStrategy;

#[async_trait]
impl AuthStrategy for AnonymousStrategy {
    fn name(&self) -> &'static str {
        "anonymous"
    }

    async fn authenticate(&self, _parts: &Parts) -> AppResult<Option<Principal>> {
        Ok(None)
    }
}

/// Authentication capability attached to each request.
#[derive(Clone)]
pub struct Authenticator {
    strategy: Arc<dyn AuthStrategy>,
}

impl Authenticator {
    pub fn new(strategy: Arc<dyn AuthStrategy>) -> Self {
        Self { strategy }
    }

    pub fn anonymous() -> Self {
        Self::new(Arc::new(AnonymousStrategy))
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub async fn authenticate(&self, parts: &Parts) -> AppResult<Option<Principal>> {
        self.strategy.authenticate(parts).await
    }
}

impl Default for Authenticator {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

impl<S> FromRequestParts<S> for Authenticator
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Authenticator>()
            .cloned()
            .ok_or_else(|| AppError::Internal("authentication is not initialized".to_string()))
    }
}

/// The caller, if authenticated.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<Principal>);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let authenticator = Authenticator::from_request_parts(parts, state).await?;
        let principal = authenticator.authenticate(parts).await?;
        Ok(CurrentUser(principal))
    }
}

/// The caller; rejects with 401 when unauthenticated.
#[derive(Debug, Clone)]
pub struct RequireUser(pub Principal);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await? {
            CurrentUser(Some(principal)) => Ok(RequireUser(principal)),
            CurrentUser(None) => Err(AppError::http(StatusCode::UNAUTHORIZED, "Unauthorized")),
        }
    }
}

/// Authentication initialization layer.
#[derive(Clone, Debug)]
pub struct AuthInitLayer {
    authenticator: Authenticator,
}

impl AuthInitLayer {
    pub fn new(authenticator: Authenticator) -> Self {
        Self { authenticator }
    }
}

impl<S> Layer<S> for AuthInitLayer {
    type Service = AuthInitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthInitService {
            inner,
            authenticator: self.authenticator.clone(),
        }
    }
}

/// Authentication initialization service wrapper.
#[derive(Clone)]
pub struct AuthInitService<S> {
    inner: S,
    authenticator: Authenticator,
}

impl<S, B> Service<Request<B>> for AuthInitService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        debug!(strategy = self.authenticator.strategy_name(), "Attaching authenticator");
        req.extensions_mut().insert(self.authenticator.clone());
        self.inner.call(req)
    }
}
