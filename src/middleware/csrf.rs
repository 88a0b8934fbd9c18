//! CSRF protection stage (double-submit with a cookie-held secret).
//!
//! # Flow
//!
//! 1. The secret lives in the `_csrf` cookie (`HttpOnly`, `Path=/`, plus the
//!    environment's [`CookiePolicy`]). A request without one gets a fresh secret
//!    and the cookie is set on the response, error responses included.
//! 2. `GET`, `HEAD` and `OPTIONS` pass through. Every other method must carry a
//!    token derived from the secret, or the request fails with
//!    [`AppError::InvalidCsrfToken`] before any router runs.
//! 3. The request gets a [`CsrfToken`] extension that handlers use to mint a
//!    token, usually mirrored into the script-readable `CSRF-TOKEN` cookie.
//!
//! # Token Format
//!
//! ```text
//! <salt>-<base64url(sha256(<salt> "-" <secret>))>
//! ```
//!
//! The salt is 8 random alphanumeric characters, so any number of tokens can be
//! minted for one secret and all of them verify.
//!
//! # Token Sources
//!
//! Checked in order: body field `_csrf`, query parameter `_csrf`, then the
//! `csrf-token`, `xsrf-token`, `x-csrf-token` and `x-xsrf-token` headers.
//!
//! Requires the cookie parsing stage to have run first.

use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{Method, Request, Response};
use axum::response::IntoResponse;
use axum_extra::extract::cookie::Cookie;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;
use rand::distr::Alphanumeric;
use serde_json::Value;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::body::ParsedBody;
use super::cookies::{append_set_cookie, request_cookies};
use crate::config::CookiePolicy;
use crate::error::AppError;

/// Cookie holding the per-client CSRF secret.
pub const CSRF_SECRET_COOKIE: &str = "_csrf";

/// Script-readable cookie the frontend echoes back in a header.
pub const CSRF_TOKEN_COOKIE: &str = "CSRF-TOKEN";

/// Body field and query parameter carrying a token.
pub const CSRF_FIELD: &str = "_csrf";

/// Headers carrying a token, in lookup order.
pub const CSRF_HEADERS: [&str; 4] = ["csrf-token", "xsrf-token", "x-csrf-token", "x-xsrf-token"];

const SECRET_BYTES: usize = 18;
const SALT_LEN: usize = 8;

/// Generate a new random secret.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::rng().fill(&mut bytes[..]);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Mint a token for `secret` with a fresh salt.
pub fn create_token(secret: &str) -> String {
    let salt: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect();
    token_with_salt(&salt, secret)
}

/// Check that `token` was minted for `secret`.
pub fn verify_token(secret: &str, token: &str) -> bool {
    let Some((salt, _)) = token.split_once('-') else {
        return false;
    };
    let expected = token_with_salt(salt, secret);
    expected.as_bytes().ct_eq(token.as_bytes()).into()
}

fn token_with_salt(salt: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"-");
    hasher.update(secret.as_bytes());
    format!("{salt}-{}", URL_SAFE_NO_PAD.encode(hasher.finalize()))
}

/// `_csrf` secret cookie.
pub fn secret_cookie(secret: String, policy: CookiePolicy) -> Cookie<'static> {
    with_policy(
        Cookie::build((CSRF_SECRET_COOKIE, secret))
            .path("/")
            .http_only(true)
            .build(),
        policy,
    )
}

/// `CSRF-TOKEN` cookie. Not `HttpOnly`: the frontend reads it to fill the
/// `CSRF-Token` header of state-changing requests.
pub fn csrf_token_cookie(token: String, policy: CookiePolicy) -> Cookie<'static> {
    with_policy(
        Cookie::build((CSRF_TOKEN_COOKIE, token)).path("/").build(),
        policy,
    )
}

fn with_policy(mut cookie: Cookie<'static>, policy: CookiePolicy) -> Cookie<'static> {
    cookie.set_secure(policy.secure);
    if let Some(same_site) = policy.same_site {
        cookie.set_same_site(same_site);
    }
    cookie
}

/// Token-generation capability attached to each request.
///
/// The first token minted is reused for the rest of the request.
#[derive(Debug, Clone)]
pub struct CsrfToken {
    secret: Arc<str>,
    minted: Arc<OnceLock<String>>,
}

impl CsrfToken {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Arc::from(secret),
            minted: Arc::new(OnceLock::new()),
        }
    }

    /// A token valid for this request's secret.
    pub fn token(&self) -> String {
        self.minted
            .get_or_init(|| create_token(&self.secret))
            .clone()
    }
}

impl<S> FromRequestParts<S> for CsrfToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CsrfToken>()
            .cloned()
            .ok_or_else(|| AppError::Internal("CSRF protection is not installed".to_string()))
    }
}

/// CSRF protection layer.
#[derive(Debug, Clone, Copy)]
pub struct CsrfLayer {
    policy: CookiePolicy,
}

impl CsrfLayer {
    pub fn new(policy: CookiePolicy) -> Self {
        Self { policy }
    }
}

impl<S> Layer<S> for CsrfLayer {
    type Service = CsrfService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CsrfService {
            inner,
            policy: self.policy,
        }
    }
}

/// CSRF protection service wrapper.
#[derive(Clone)]
pub struct CsrfService<S> {
    inner: S,
    policy: CookiePolicy,
}

impl<S> Service<Request<Body>> for CsrfService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let policy = self.policy;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let Some(jar) = request_cookies(&req) else {
                return Ok(AppError::Internal(
                    "cookie parsing must run before CSRF protection".to_string(),
                )
                .into_response());
            };

            let existing = jar
                .get(CSRF_SECRET_COOKIE)
                .map(|c| c.value().to_string())
                .filter(|v| !v.is_empty());

            let (secret, issued) = match existing {
                Some(secret) => (secret, None),
                None => {
                    let secret = generate_secret();
                    debug!("Issuing new CSRF secret");
                    let cookie = secret_cookie(secret.clone(), policy);
                    (secret, Some(cookie))
                }
            };

            let allowed = is_safe_method(req.method())
                || request_token(&req).is_some_and(|token| verify_token(&secret, &token));

            let mut response = if allowed {
                req.extensions_mut().insert(CsrfToken::new(&secret));
                inner.call(req).await?
            } else {
                warn!(
                    method = %req.method(),
                    path = %req.uri().path(),
                    "Missing or invalid CSRF token"
                );
                AppError::InvalidCsrfToken.into_response()
            };

            if let Some(cookie) = issued {
                append_set_cookie(&mut response, &cookie);
            }

            Ok(response)
        })
    }
}

fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Find the token a request submitted.
///
/// Sources are tried in order and blank values fall through to the next one.
/// A body field that is present but not a string is still the submitted
/// token, rendered as JSON so it can never verify.
fn request_token<B>(req: &Request<B>) -> Option<String> {
    let body_field = req
        .extensions()
        .get::<ParsedBody>()
        .and_then(|body| body.field(CSRF_FIELD));
    if let Some(token) = body_field.and_then(submitted_value) {
        return Some(token);
    }

    if let Some(query) = req.uri().query()
        && let Ok(pairs) = serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        && let Some((_, token)) = pairs
            .into_iter()
            .find(|(key, value)| key == CSRF_FIELD && !value.is_empty())
    {
        return Some(token);
    }

    CSRF_HEADERS.iter().find_map(|name| {
        req.headers()
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    })
}

fn submitted_value(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use axum_extra::extract::cookie::SameSite;
    use serde_json::json;

    use super::*;

    const DEV: CookiePolicy = CookiePolicy {
        secure: false,
        same_site: None,
    };
    const PROD: CookiePolicy = CookiePolicy {
        secure: true,
        same_site: Some(SameSite::Lax),
    };

    #[test]
    fn test_secret_shape() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 24);
        assert_ne!(secret, generate_secret());
    }

    #[test]
    fn test_token_verifies_against_its_secret() {
        let secret = generate_secret();
        let token = create_token(&secret);

        assert!(verify_token(&secret, &token));
        assert!(!verify_token(&generate_secret(), &token));
    }

    #[test]
    fn test_tokens_are_salted() {
        let secret = generate_secret();
        let a = create_token(&secret);
        let b = create_token(&secret);

        assert_ne!(a, b);
        assert!(verify_token(&secret, &a));
        assert!(verify_token(&secret, &b));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let secret = generate_secret();
        assert!(!verify_token(&secret, ""));
        assert!(!verify_token(&secret, "no-dash-but-wrong"));
        assert!(!verify_token(&secret, "nodash"));
    }

    #[test]
    fn test_csrf_token_capability_is_stable_per_request() {
        let capability = CsrfToken::new("secret");
        assert_eq!(capability.token(), capability.token());
        assert!(verify_token("secret", &capability.token()));
    }

    #[test]
    fn test_dev_cookie_attributes() {
        let cookie = secret_cookie("s".to_string(), DEV).to_string();
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Path=/"));
        assert!(!cookie.contains("Secure"));
        assert!(!cookie.contains("SameSite"));
    }

    #[test]
    fn test_prod_cookie_attributes() {
        let cookie = secret_cookie("s".to_string(), PROD).to_string();
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Lax"));

        let token_cookie = csrf_token_cookie("t".to_string(), PROD).to_string();
        assert!(token_cookie.starts_with("CSRF-TOKEN=t"));
        assert!(!token_cookie.contains("HttpOnly"));
        assert!(token_cookie.contains("SameSite=Lax"));
    }

    #[test]
    fn test_request_token_sources() {
        let from_header = Request::builder()
            .header("x-csrf-token", "from-header")
            .body(())
            .unwrap();
        assert_eq!(request_token(&from_header).as_deref(), Some("from-header"));

        let from_query = Request::builder()
            .uri("/api/tweets?_csrf=from-query")
            .header("csrf-token", "from-header")
            .body(())
            .unwrap();
        assert_eq!(request_token(&from_query).as_deref(), Some("from-query"));

        let mut from_body = Request::builder()
            .uri("/api/tweets?_csrf=from-query")
            .body(())
            .unwrap();
        from_body
            .extensions_mut()
            .insert(ParsedBody(json!({ "_csrf": "from-body" })));
        assert_eq!(request_token(&from_body).as_deref(), Some("from-body"));

        let none = Request::builder().body(()).unwrap();
        assert_eq!(request_token(&none), None);
    }

    #[test]
    fn test_blank_sources_fall_through() {
        let mut req = Request::builder()
            .uri("/api/tweets?_csrf=")
            .header("csrf-token", "")
            .header("x-csrf-token", "from-header")
            .body(())
            .unwrap();
        req.extensions_mut()
            .insert(ParsedBody(json!({ "_csrf": "", "text": "hi" })));

        assert_eq!(request_token(&req).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_non_string_body_token_is_submitted_and_fails() {
        let secret = generate_secret();
        let token = create_token(&secret);

        let mut req = Request::builder()
            .header("csrf-token", token.as_str())
            .body(())
            .unwrap();
        req.extensions_mut()
            .insert(ParsedBody(json!({ "_csrf": [token.as_str(), token.as_str()] })));

        let submitted = request_token(&req).unwrap();
        assert!(submitted.starts_with('['));
        assert!(!verify_token(&secret, &submitted));
    }

    #[test]
    fn test_safe_methods() {
        assert!(is_safe_method(&Method::GET));
        assert!(is_safe_method(&Method::HEAD));
        assert!(is_safe_method(&Method::OPTIONS));
        assert!(!is_safe_method(&Method::POST));
        assert!(!is_safe_method(&Method::DELETE));
    }
}
